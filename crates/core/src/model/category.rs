use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::CategoryId;
use crate::time::serde_timestamp;

/// A category that partitions cards; every card belongs to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordering hint from the server. Not enforced here.
    #[serde(default)]
    pub priority: i32,
    #[serde(with = "serde_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<u64>,
}
