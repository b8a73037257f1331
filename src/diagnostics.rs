//! Routes parser findings through the configured [`ErrorHandling`] slots.

use crate::error::BuildCause;
use crate::policy::{ErrorHandling, Reaction};

#[derive(Debug, Clone, Copy)]
pub struct Diagnostics {
    handling: ErrorHandling,
}

impl Diagnostics {
    pub fn new(handling: ErrorHandling) -> Self {
        Self { handling }
    }

    /// Reports a warning; fails only when warnings escalate.
    pub fn warning(&self, message: impl Into<String>) -> Result<(), BuildCause> {
        let message = message.into();
        match self.handling.on_warning {
            Reaction::Ignore => {
                log::debug!("Ignoring parser warning: {}", message);
                Ok(())
            }
            Reaction::Escalate => Err(BuildCause::Warning(message)),
        }
    }

    /// Reports a recoverable error; the build continues when errors are ignored.
    pub fn error(&self, cause: BuildCause) -> Result<(), BuildCause> {
        match self.handling.on_error {
            Reaction::Ignore => {
                log::warn!("Ignoring parser error: {}", cause);
                Ok(())
            }
            Reaction::Escalate => Err(cause),
        }
    }

    /// Reports a fatal error. The build always ends here.
    pub fn fatal(&self, cause: BuildCause) -> BuildCause {
        if self.handling.on_fatal_error == Reaction::Ignore {
            log::error!("Fatal parser error cannot be ignored: {}", cause);
        }
        cause
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(ErrorHandling::default())
    }
}
