mod progress;
mod recorder;
mod runner;
mod selector;

// Public API of the session subsystem.
pub use crate::error::{RecordError, SessionError};
pub use progress::{SessionProgress, SessionReport};
pub use recorder::{OutcomeRecorder, RecordReceipt};
pub use runner::{SessionAnswer, SessionRunner, SessionState, SessionStatus};
pub use selector::{SessionFilter, SessionSelector};
