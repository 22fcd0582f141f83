//! Engine health and the lazy output restart.

use crate::backend::AudioBackend;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Health {
    /// Output prepared and last start attempt succeeded.
    Ready,
    /// Output refused to start; the next play retries once.
    StartFailed,
    /// Output could not be prepared or nothing is playable. Terminal.
    Unavailable,
}

/// Start the backend if it is not running, updating `health`. Returns whether
/// output is running afterwards. Never retries `Unavailable`.
pub(crate) fn ensure_running(backend: &dyn AudioBackend, health: &mut Health, who: &str) -> bool {
    if *health == Health::Unavailable {
        return false;
    }
    if backend.is_running() {
        return true;
    }
    match backend.start() {
        Ok(()) => {
            if *health != Health::Ready {
                log::info!("{who}: audio output recovered");
            }
            *health = Health::Ready;
            true
        }
        Err(e) => {
            log::warn!("{who}: {e}");
            *health = Health::StartFailed;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;

    #[test]
    fn lazy_start_transitions() {
        let b = OfflineBackend::new(48_000.0).failing_start(1);
        let mut h = Health::Ready;
        assert!(!ensure_running(&b, &mut h, "test"));
        assert_eq!(h, Health::StartFailed);
        assert!(ensure_running(&b, &mut h, "test"));
        assert_eq!(h, Health::Ready);

        let mut dead = Health::Unavailable;
        assert!(!ensure_running(&b, &mut dead, "test"));
        assert_eq!(dead, Health::Unavailable);
    }
}
