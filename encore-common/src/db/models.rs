//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A local account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub signup_ip: String,
    pub created_at: DateTime<Utc>,
}

/// A comment row as stored
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A comment joined with its author's username, as served to the UI
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentView {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
