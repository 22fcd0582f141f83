//! Device-less backend.
//!
//! Voices live in a [`Mixer`]; whoever owns the backend pulls audio with
//! `mixer().render(..)` (FFI hosts, tests, offline bouncing). Failure
//! injection hooks let the engine's degraded paths be driven on purpose.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::backend::{AudioBackend, VoiceHandle};
use crate::error::EngineError;
use crate::mixer::Mixer;

#[derive(Debug)]
pub struct OfflineBackend {
    sample_rate: f32,
    mixer: Mixer,
    running: AtomicBool,
    fail_prepare: bool,
    start_failures: AtomicU32,
    voice_limit: Option<usize>,
}

impl OfflineBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            mixer: Mixer::new(),
            running: AtomicBool::new(false),
            fail_prepare: false,
            start_failures: AtomicU32::new(0),
            voice_limit: None,
        }
    }

    /// Make `prepare` fail.
    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    /// Make the next `n` calls to `start` fail.
    pub fn failing_start(self, n: u32) -> Self {
        self.start_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Refuse to create more than `n` voices in total.
    pub fn with_voice_limit(mut self, n: usize) -> Self {
        self.voice_limit = Some(n);
        self
    }

    /// Simulate the output being torn down from outside (route change, interruption).
    pub fn interrupt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Mixer the host pulls audio from.
    pub fn mixer(&self) -> &Mixer { &self.mixer }
}

impl AudioBackend for OfflineBackend {
    fn prepare(&self) -> Result<(), EngineError> {
        if self.fail_prepare {
            return Err(EngineError::Prepare("offline output format rejected".into()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::Prepare(format!("invalid sample rate {}", self.sample_rate)));
        }
        Ok(())
    }

    fn start(&self) -> Result<(), EngineError> {
        let pending = self.start_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.start_failures.store(pending - 1, Ordering::SeqCst);
            return Err(EngineError::Start("offline output refused to start".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    fn sample_rate(&self) -> f32 { self.sample_rate }

    fn create_voice(&self) -> Result<Box<dyn VoiceHandle>, EngineError> {
        if let Some(limit) = self.voice_limit {
            if self.mixer.voice_count() >= limit {
                return Err(EngineError::Voice(format!("voice limit {limit} reached")));
            }
        }
        Ok(Box::new(self.mixer.add_voice()))
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_failures_are_counted_down() {
        let b = OfflineBackend::new(48_000.0).failing_start(2);
        assert!(b.start().is_err());
        assert!(b.start().is_err());
        assert!(!b.is_running());
        assert!(b.start().is_ok());
        assert!(b.is_running());
        b.interrupt();
        assert!(!b.is_running());
    }

    #[test]
    fn voice_limit_is_enforced() {
        let b = OfflineBackend::new(48_000.0).with_voice_limit(2);
        let first = b.create_voice();
        let second = b.create_voice();
        assert!(first.is_ok() && second.is_ok());
        assert!(matches!(b.create_voice(), Err(EngineError::Voice(_))));
        assert_eq!(b.mixer().voice_count(), 2);

        // Dropped voices free their place under the limit.
        drop(second);
        assert_eq!(b.mixer().voice_count(), 1);
        assert!(b.create_voice().is_ok());
    }

    #[test]
    fn prepare_rejects_bad_rate() {
        assert!(OfflineBackend::new(0.0).prepare().is_err());
        assert!(OfflineBackend::new(48_000.0).failing_prepare().prepare().is_err());
        assert!(OfflineBackend::new(48_000.0).prepare().is_ok());
    }
}
