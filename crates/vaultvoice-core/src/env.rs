//! Environment abstraction for deterministic testing.
//!
//! Decouples case logic from system resources (wall-clock time, randomness
//! for identifiers). Production uses real system resources; tests inject a
//! fixed clock and a seeded RNG.
//!
//! AEAD nonces, salts and case keys never come from here. Those are always
//! drawn from the OS CSPRNG inside `vaultvoice-crypto`.

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production;
///   session and case ids are bearer secrets
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used to stamp `createdAt` on thread items and case records. Not
    /// required to be monotonic; thread ordering tolerates equal stamps.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG in production
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Deterministic environment for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    };

    use rand::{RngCore, SeedableRng, rngs::StdRng};

    use super::Environment;

    /// Environment with a manually driven clock and a seeded RNG.
    ///
    /// Clones share the clock and RNG, so advancing time through one handle is
    /// visible to every component holding another.
    #[derive(Clone)]
    pub struct MockEnv {
        clock: Arc<AtomicU64>,
        rng: Arc<Mutex<StdRng>>,
    }

    impl MockEnv {
        /// Clock starting at `start_millis` and an RNG seeded with `seed`.
        pub fn new(seed: u64, start_millis: u64) -> Self {
            Self {
                clock: Arc::new(AtomicU64::new(start_millis)),
                rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            }
        }

        /// Fixed seed, clock at 1 000 000 ms.
        pub fn seeded(seed: u64) -> Self {
            Self::new(seed, 1_000_000)
        }

        /// Move the clock forward.
        pub fn advance(&self, millis: u64) {
            self.clock.fetch_add(millis, Ordering::SeqCst);
        }

        /// Set the clock to an absolute value.
        pub fn set_time(&self, millis: u64) {
            self.clock.store(millis, Ordering::SeqCst);
        }
    }

    impl Environment for MockEnv {
        fn wall_clock_millis(&self) -> u64 {
            self.clock.load(Ordering::SeqCst)
        }

        #[allow(clippy::expect_used)]
        fn random_bytes(&self, buffer: &mut [u8]) {
            self.rng.lock().expect("Mutex poisoned").fill_bytes(buffer);
        }
    }
}
