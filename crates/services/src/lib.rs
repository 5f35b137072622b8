#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod overview;
pub mod sessions;
pub mod sync;

pub use study_core::Clock;
pub use sessions as session;

pub use app_services::StudyServices;
pub use config::SessionConfig;
pub use error::{RecordError, SessionError};
pub use overview::StudyOverview;
pub use sync::StoreSync;

pub use sessions::{
    OutcomeRecorder, RecordReceipt, SessionAnswer, SessionFilter, SessionProgress, SessionReport,
    SessionRunner, SessionSelector, SessionState, SessionStatus,
};
