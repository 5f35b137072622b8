use std::env;

use tracing::warn;

const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_DUE_LIMIT: u32 = 20;

/// Page sizes used when selecting cards for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound for category and tag sessions.
    pub page_size: u32,
    /// Default upper bound for due sessions when the filter gives none.
    pub due_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            due_limit: DEFAULT_DUE_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Read `STUDY_PAGE_SIZE` and `STUDY_DUE_LIMIT`, keeping defaults for
    /// unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: read_limit("STUDY_PAGE_SIZE").unwrap_or(defaults.page_size),
            due_limit: read_limit("STUDY_DUE_LIMIT").unwrap_or(defaults.due_limit),
        }
    }
}

fn read_limit(key: &str) -> Option<u32> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = %raw, "ignoring invalid limit");
            None
        }
    }
}
