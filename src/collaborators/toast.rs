//! Console notifier.

use crate::collaborators::Notifier;
use crate::error::CollaboratorError;

/// Prints the confirmation on stderr, next to the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleToast;

impl Notifier for ConsoleToast {
    fn announce(&self, text: &str) -> Result<(), CollaboratorError> {
        eprintln!("📋 {text}");
        Ok(())
    }
}
