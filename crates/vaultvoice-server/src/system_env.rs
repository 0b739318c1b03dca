//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` stamps records with the real wall clock and draws identifiers
//! from the OS CSPRNG. Behavior is non-deterministic; tests use
//! `MockEnv` from `vaultvoice-core` instead.

use vaultvoice_core::Environment;

/// Wall clock plus the OS CSPRNG.
///
/// Session ids, case ids and auth tokens are bearer secrets and are drawn
/// through [`Environment::random_bytes`], so this must never be swapped for a
/// seeded generator outside tests.
///
/// # Panics
///
/// Panics if the OS RNG fails. A service that cannot draw unpredictable
/// session ids must not hand any out.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    #[allow(clippy::cast_possible_truncation)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot issue secret handles");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }

    #[test]
    fn generated_session_ids_differ() {
        let env = SystemEnv::new();
        let a = vaultvoice_core::SessionId::generate(&env);
        let b = vaultvoice_core::SessionId::generate(&env);
        assert_ne!(a, b);
    }
}
