//! Module that contains utility functions for fault injection in test code
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum When {
    Always,
    /// Fires on the first call only. Clones of the fault share the trigger,
    /// so a `Once` fault injected into several places still fires once.
    Once,
    Never,
}

/// A fault is an error that is returned based on the [`When`]
#[derive(Clone, Debug)]
pub struct Fault {
    pub when: When,
    fired: Arc<AtomicBool>,
}

impl Fault {
    pub fn new(when: When) -> Self {
        Self {
            when,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the fault fires for this call.
    pub fn triggers(&self) -> bool {
        match self.when {
            When::Always => true,
            When::Never => false,
            When::Once => !self.fired.swap(true, Ordering::SeqCst),
        }
    }
}

impl Default for Fault {
    fn default() -> Self {
        Self::new(When::Never)
    }
}
