//! News item types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A posted news item. `likes` is a denormalized count of the like ledger
/// rows referencing this item, kept in sync transactionally by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// News creation request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsDraft {
    pub content: String,
}
