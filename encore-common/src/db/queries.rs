//! Query helpers for users and comments

use crate::db::models::{Comment, CommentView, User};
use crate::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Insert a new user row and return it
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    signup_ip: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password_hash, signup_ip, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password_hash, signup_ip, created_at
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(signup_ip)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, signup_ip, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Number of accounts registered from the given IP (signup throttling)
pub async fn count_users_by_ip(pool: &SqlitePool, ip: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE signup_ip = ?")
        .bind(ip)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn insert_comment(
    pool: &SqlitePool,
    user_id: i64,
    title: &str,
    body: &str,
) -> Result<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (user_id, title, body, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, user_id, title, body, created_at
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(body)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(comment)
}

/// All comments joined with author usernames, newest first
pub async fn list_comments(pool: &SqlitePool) -> Result<Vec<CommentView>> {
    let comments = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT c.id, c.user_id, u.username, c.title, c.body, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.user_id
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

pub async fn count_comments_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn get_comment(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        "SELECT id, user_id, title, body, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(comment)
}

pub async fn delete_comment(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
