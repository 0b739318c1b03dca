//! VaultVoice command-line front end.
//!
//! Runs the case service in-process against a data directory, driving the
//! submitter and investigator coordinators the same way a browser or
//! dashboard would over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # One-time setup: investigator key pair and dashboard credentials
//! vaultvoice --data-dir ./vv init-investigator \
//!     --username inv --password s3cret --key-password k3y
//!
//! # Submitter files a report; prints the session id exactly once
//! vaultvoice --data-dir ./vv submit --passphrase correct-horse "Fraud in dept X"
//!
//! # Submitter follows up
//! vaultvoice --data-dir ./vv follow-up --session-id <id> --passphrase correct-horse \
//!     --message "More details"
//!
//! # Investigator triage
//! vaultvoice --data-dir ./vv cases --username inv --password s3cret
//! vaultvoice --data-dir ./vv open-case --case-id <id> --username inv --password s3cret \
//!     --key-password k3y
//! vaultvoice --data-dir ./vv set-status --case-id <id> --status in-review \
//!     --username inv --password s3cret
//! ```

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vaultvoice_client::{InvestigatorSession, RedbKeyStore, SubmitterSession};
use vaultvoice_core::{CaseId, CaseStatus, DecryptedItem, SealedPrivateKey, Sender, seal_private_key};
use vaultvoice_crypto::{DEFAULT_RSA_BITS, InvestigatorKeyPair, Zeroizing};
use vaultvoice_server::{
    CaseService, InvestigatorCredentials, RedbStorage, ServiceConfig, ServiceError, SystemEnv,
};

const CONFIG_FILE: &str = "service.json";
const SEALED_KEY_FILE: &str = "investigator_key.json";
const CASES_DB: &str = "cases.redb";
const DEVICE_KEYS_DB: &str = "device_keys.redb";

/// Anonymous report submission with end-to-end encrypted follow-up
#[derive(Parser, Debug)]
#[command(name = "vaultvoice")]
#[command(about = "VaultVoice anonymous reporting")]
#[command(version)]
struct Args {
    /// Directory holding the case database, config and key files
    #[arg(long, default_value = "vaultvoice-data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the investigator key pair and dashboard credentials
    InitInvestigator {
        /// Dashboard user name
        #[arg(long)]
        username: String,
        /// Dashboard password
        #[arg(long)]
        password: String,
        /// Password sealing the investigator private key
        #[arg(long)]
        key_password: String,
        /// Replace an existing setup
        #[arg(long)]
        force: bool,
    },

    /// File a new report
    Submit {
        /// Passphrase protecting the case key on this device
        #[arg(long)]
        passphrase: String,
        /// Report text
        report: String,
    },

    /// Unlock a case as the submitter, show the thread, optionally reply
    FollowUp {
        /// Session id printed by `submit`
        #[arg(long)]
        session_id: String,
        /// Passphrase chosen at submission
        #[arg(long)]
        passphrase: String,
        /// Follow-up message to append
        #[arg(long)]
        message: Option<String>,
    },

    /// List submitted cases
    Cases {
        #[command(flatten)]
        login: Login,
    },

    /// Decrypt and show one case
    OpenCase {
        #[command(flatten)]
        case: OpenCaseArgs,
    },

    /// Reply to a case
    Reply {
        #[command(flatten)]
        case: OpenCaseArgs,
        /// Reply text
        #[arg(long)]
        message: String,
    },

    /// Move a case to a later status
    SetStatus {
        /// Case id from `cases`
        #[arg(long)]
        case_id: CaseId,
        /// New status (in-review, closed)
        #[arg(long)]
        status: CaseStatus,
        #[command(flatten)]
        login: Login,
    },
}

#[derive(ClapArgs, Debug)]
struct Login {
    /// Dashboard user name
    #[arg(long)]
    username: String,
    /// Dashboard password
    #[arg(long)]
    password: String,
}

#[derive(ClapArgs, Debug)]
struct OpenCaseArgs {
    /// Case id from `cases`
    #[arg(long)]
    case_id: CaseId,
    /// Password sealing the investigator private key
    #[arg(long)]
    key_password: String,
    #[command(flatten)]
    login: Login,
}

type Service = CaseService<RedbStorage, SystemEnv>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    std::fs::create_dir_all(&args.data_dir)?;
    let data_dir = args.data_dir;

    match args.command {
        Command::InitInvestigator { username, password, key_password, force } => {
            init_investigator(&data_dir, &username, &password, &key_password, force).await?;
            emit("investigator initialised")?;
        },

        Command::Submit { passphrase, report } => {
            let mut session = submitter(&data_dir)?;
            let session_id = session.submit(&report, &passphrase).await?;

            emit("report submitted; keep this session id, it is shown only once:")?;
            emit(&session_id.to_string())?;
        },

        Command::FollowUp { session_id, passphrase, message } => {
            let mut session = submitter(&data_dir)?;
            session.authenticate(&session_id, &passphrase).await?;

            if let Some(message) = message {
                session.post(&message).await?;
            }

            let thread = session.refresh().await?;
            if let Some(status) = session.status() {
                emit(&format!("status: {status}"))?;
            }
            print_thread(&thread)?;
            session.lock();
        },

        Command::Cases { login } => {
            let mut session = InvestigatorSession::new(open_service(&data_dir)?, SystemEnv::new());
            session.login(&login.username, &login.password).await?;

            for case in session.list_cases().await? {
                emit(&format!(
                    "{}  created={}  status={}  ml={:?} ({:.2})",
                    case.case_id, case.created_at, case.status, case.ml_label, case.ml_score
                ))?;
            }
        },

        Command::OpenCase { case } => {
            let (session, thread) = open_case(&data_dir, &case).await?;
            if let Some(summary) = session.open_case_summary() {
                emit(&format!("case {}  status={}", summary.case_id, summary.status))?;
            }
            print_thread(&thread)?;
        },

        Command::Reply { case, message } => {
            let (mut session, _) = open_case(&data_dir, &case).await?;
            session.reply(&message).await?;
            let thread = session.refresh().await?;
            print_thread(&thread)?;
        },

        Command::SetStatus { case_id, status, login } => {
            let mut session = InvestigatorSession::new(open_service(&data_dir)?, SystemEnv::new());
            session.login(&login.username, &login.password).await?;

            let summary = session.set_status(&case_id, status).await?;
            emit(&format!("case {}  status={}", summary.case_id, summary.status))?;
        },
    }

    Ok(())
}

fn open_service(data_dir: &Path) -> Result<Service, ServiceError> {
    let config = ServiceConfig::load(data_dir.join(CONFIG_FILE))?;
    let storage = RedbStorage::open(data_dir.join(CASES_DB))?;
    CaseService::new(config, storage, SystemEnv::new())
}

fn submitter(
    data_dir: &Path,
) -> Result<SubmitterSession<Service, RedbKeyStore, SystemEnv>, Box<dyn std::error::Error>> {
    let key_store = RedbKeyStore::open(data_dir.join(DEVICE_KEYS_DB))?;
    Ok(SubmitterSession::new(open_service(data_dir)?, key_store, SystemEnv::new()))
}

fn load_sealed_key(data_dir: &Path) -> Result<SealedPrivateKey, ServiceError> {
    let path = data_dir.join(SEALED_KEY_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| ServiceError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))
}

type OpenedCase = (InvestigatorSession<Service, SystemEnv>, Vec<DecryptedItem>);

async fn open_case(
    data_dir: &Path,
    args: &OpenCaseArgs,
) -> Result<OpenedCase, Box<dyn std::error::Error>> {
    let sealed = load_sealed_key(data_dir)?;
    let mut session = InvestigatorSession::new(open_service(data_dir)?, SystemEnv::new());

    session.login(&args.login.username, &args.login.password).await?;
    let thread = session.open_case(&args.case_id, &sealed, &args.key_password).await?;

    Ok((session, thread))
}

async fn init_investigator(
    data_dir: &Path,
    username: &str,
    password: &str,
    key_password: &str,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        return Err(Box::new(ServiceError::Config(format!(
            "{} already exists; pass --force to replace it",
            config_path.display()
        ))));
    }

    let key_password = Zeroizing::new(key_password.to_owned());
    let (public_pem, sealed) = tokio::task::spawn_blocking(move || {
        let pair = InvestigatorKeyPair::generate(DEFAULT_RSA_BITS)?;
        let sealed = seal_private_key(&pair.private_key, &key_password)?;
        let public_pem = pair.public_key.to_pem()?;
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>((public_pem, sealed))
    })
    .await?
    .map_err(|e| ServiceError::Crypto(e.to_string()))?;

    let credentials = InvestigatorCredentials::new(username, password)?;
    std::fs::write(data_dir.join(SEALED_KEY_FILE), serde_json::to_string_pretty(&sealed)?)?;
    ServiceConfig::new(public_pem, credentials).save(&config_path)?;

    tracing::info!(data_dir = %data_dir.display(), "investigator initialised");
    Ok(())
}

fn print_thread(thread: &[DecryptedItem]) -> std::io::Result<()> {
    for item in thread {
        let author = match item.sender {
            Sender::Submitter => "submitter",
            Sender::Investigator => "investigator",
        };
        let body = item.text().unwrap_or("<could not decrypt this item>");
        emit(&format!("[{}] {author} ({:?}): {body}", item.created_at, item.item_type))?;
    }
    Ok(())
}

fn emit(line: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")
}
