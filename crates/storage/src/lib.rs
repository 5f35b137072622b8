#![forbid(unsafe_code)]

pub mod cache;
pub mod remote;

pub use cache::{CardStore, StoreSnapshot};
pub use remote::{ApiError, StudyApi};
