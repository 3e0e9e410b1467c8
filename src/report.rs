//! Where the pipeline sends its diagnostics.
//!
//! Pipeline code takes a `&dyn Reporter` instead of calling the global
//! logger, so callers and tests decide where findings end up.

pub trait Reporter {
    fn trace(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}

    fn info(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn trace(&self, message: &str) {
        log::trace!("{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}
