//! # Database Module
//!
//! SQLite persistence through a shared `sqlx` pool. Free functions hold the
//! queries; `SqliteStore` exposes them through the traits in `crate::store`.
//! Multi-statement updates (bulk inserts, referral rewards, withdrawal
//! decisions) run inside a single transaction.

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::store::{
    CandidateStore, ConnectionStore, ConversationTurn, HistoryStore, QaPair, QaStore, Role,
};

/// Connections kept by the pool for file databases
pub const MAX_CONNECTIONS: u32 = 5;

/// Registered bot user
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub referrer_id: Option<i64>,
    pub balance: i64,
    pub referrals_count: i64,
    pub rewarded: bool,
    pub joined_at: DateTime<Utc>,
}

/// Global bot settings (single row)
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Settings {
    pub required_channel: String,
    pub check_subscription: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

/// Withdrawal request
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Open (and create if missing) the database at `database_url`
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    info!(database_url = %database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database url: {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Private in-memory database; one connection so every query sees the same data
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create responses table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS qa_pairs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            keywords TEXT NOT NULL DEFAULT ''
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create qa_pairs table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversation_turns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create conversation_turns table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversation_turns_user
         ON conversation_turns (user_id, id)",
    )
    .execute(pool)
    .await
    .context("Failed to create conversation_turns index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS business_connections (
            connection_id TEXT PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create business_connections table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT,
            referrer_id INTEGER,
            balance INTEGER NOT NULL DEFAULT 0,
            referrals_count INTEGER NOT NULL DEFAULT 0,
            rewarded INTEGER NOT NULL DEFAULT 0,
            joined_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            required_channel TEXT NOT NULL DEFAULT '',
            check_subscription INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create settings table")?;

    sqlx::query(
        "INSERT OR IGNORE INTO settings (id, required_channel, check_subscription)
         VALUES (1, '', 0)",
    )
    .execute(pool)
    .await
    .context("Failed to insert default settings")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS withdrawals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create withdrawals table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

// ----------------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------------

/// Insert every non-blank line (trimmed) in one transaction
pub async fn add_responses_bulk(pool: &SqlitePool, lines: &[String]) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut inserted = 0;

    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        sqlx::query("INSERT INTO responses (text) VALUES (?1)")
            .bind(line)
            .execute(&mut *tx)
            .await
            .context("Failed to insert response")?;
        inserted += 1;
    }

    tx.commit().await.context("Failed to commit responses")?;
    info!(inserted, "Responses stored");
    Ok(inserted)
}

pub async fn get_all_responses(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT text FROM responses ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to read responses")
}

pub async fn clear_all_responses(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query("DELETE FROM responses")
        .execute(pool)
        .await
        .context("Failed to clear responses")?;
    info!(deleted = result.rows_affected(), "Responses cleared");
    Ok(())
}

pub async fn count_responses(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM responses")
        .fetch_one(pool)
        .await
        .context("Failed to count responses")
}

// ----------------------------------------------------------------------------
// Question/answer dataset
// ----------------------------------------------------------------------------

pub async fn insert_qa_pairs(pool: &SqlitePool, pairs: &[QaPair]) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for pair in pairs {
        sqlx::query("INSERT INTO qa_pairs (question, answer, keywords) VALUES (?1, ?2, ?3)")
            .bind(&pair.question)
            .bind(&pair.answer)
            .bind(pair.keywords.join(" "))
            .execute(&mut *tx)
            .await
            .context("Failed to insert question/answer pair")?;
    }

    tx.commit().await.context("Failed to commit dataset")?;
    info!(inserted = pairs.len(), "Dataset pairs stored");
    Ok(pairs.len())
}

pub async fn get_qa_pairs(pool: &SqlitePool) -> Result<Vec<QaPair>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        "SELECT question, answer, keywords FROM qa_pairs ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to read dataset")?;

    Ok(rows
        .into_iter()
        .map(|(question, answer, keywords)| QaPair {
            question,
            answer,
            keywords: keywords.split_whitespace().map(str::to_string).collect(),
        })
        .collect())
}

pub async fn clear_qa_pairs(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM qa_pairs")
        .execute(pool)
        .await
        .context("Failed to clear dataset")?;
    Ok(())
}

pub async fn count_qa_pairs(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM qa_pairs")
        .fetch_one(pool)
        .await
        .context("Failed to count dataset")
}

// ----------------------------------------------------------------------------
// Conversation history
// ----------------------------------------------------------------------------

pub async fn append_turn(pool: &SqlitePool, user_id: i64, role: Role, text: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO conversation_turns (user_id, role, text, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(role.as_str())
    .bind(text)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to append conversation turn")?;
    debug!(user_id, role = %role, "Conversation turn stored");
    Ok(())
}

pub async fn recent_turns(
    pool: &SqlitePool,
    user_id: i64,
    limit: usize,
) -> Result<Vec<ConversationTurn>> {
    let rows = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
        "SELECT user_id, role, text, created_at FROM conversation_turns
         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to read conversation history")?;

    let mut turns = rows
        .into_iter()
        .map(|(user_id, role, text, created_at)| {
            Ok(ConversationTurn {
                user_id,
                role: role.parse()?,
                text,
                created_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    turns.reverse();
    Ok(turns)
}

// ----------------------------------------------------------------------------
// Business connections
// ----------------------------------------------------------------------------

pub async fn get_connection_owner(pool: &SqlitePool, connection_id: &str) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        "SELECT owner_id FROM business_connections WHERE connection_id = ?1",
    )
    .bind(connection_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read business connection")
}

pub async fn set_connection_owner(
    pool: &SqlitePool,
    connection_id: &str,
    owner_id: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO business_connections (connection_id, owner_id, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(connection_id) DO UPDATE SET owner_id = excluded.owner_id,
                                                  updated_at = excluded.updated_at",
    )
    .bind(connection_id)
    .bind(owner_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to store business connection")?;
    info!(connection_id = %connection_id, owner_id, "Business connection stored");
    Ok(())
}

pub async fn delete_connection(pool: &SqlitePool, connection_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM business_connections WHERE connection_id = ?1")
        .bind(connection_id)
        .execute(pool)
        .await
        .context("Failed to delete business connection")?;
    Ok(result.rows_affected() > 0)
}

// ----------------------------------------------------------------------------
// Users and referrals
// ----------------------------------------------------------------------------

/// Register a user; returns `false` if the user already exists
pub async fn add_user(
    pool: &SqlitePool,
    user_id: i64,
    username: Option<&str>,
    referrer_id: Option<i64>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO users (id, username, referrer_id, joined_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(username)
    .bind(referrer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    let created = result.rows_affected() > 0;
    if created {
        info!(user_id, referrer_id = ?referrer_id, "New user registered");
    }
    Ok(created)
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, referrer_id, balance, referrals_count, rewarded, joined_at
         FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read user")
}

pub async fn update_user_balance(pool: &SqlitePool, user_id: i64, delta: i64) -> Result<()> {
    sqlx::query("UPDATE users SET balance = balance + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update balance")?;
    Ok(())
}

/// Credit `referrer_id` for bringing `user_id`, at most once per user.
///
/// Returns `true` when the reward was granted by this call.
pub async fn reward_referrer(
    pool: &SqlitePool,
    user_id: i64,
    referrer_id: i64,
    amount: i64,
) -> Result<bool> {
    if user_id == referrer_id {
        return Ok(false);
    }

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let marked = sqlx::query("UPDATE users SET rewarded = 1 WHERE id = ?1 AND rewarded = 0")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to mark user as rewarded")?
        .rows_affected();

    if marked == 0 {
        tx.rollback().await.context("Failed to roll back reward")?;
        return Ok(false);
    }

    let credited = sqlx::query(
        "UPDATE users SET balance = balance + ?1, referrals_count = referrals_count + 1
         WHERE id = ?2",
    )
    .bind(amount)
    .bind(referrer_id)
    .execute(&mut *tx)
    .await
    .context("Failed to credit referrer")?
    .rows_affected();

    if credited == 0 {
        tx.rollback().await.context("Failed to roll back reward")?;
        return Ok(false);
    }

    tx.commit().await.context("Failed to commit reward")?;
    info!(user_id, referrer_id, amount, "Referral reward granted");
    Ok(true)
}

pub async fn get_total_users(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")
}

pub async fn get_total_balance(pool: &SqlitePool) -> Result<i64> {
    let total = sqlx::query_scalar::<_, Option<i64>>("SELECT SUM(balance) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to sum balances")?;
    Ok(total.unwrap_or(0))
}

// ----------------------------------------------------------------------------
// Settings
// ----------------------------------------------------------------------------

pub async fn get_settings(pool: &SqlitePool) -> Result<Settings> {
    sqlx::query_as::<_, Settings>(
        "SELECT required_channel, check_subscription FROM settings WHERE id = 1",
    )
    .fetch_one(pool)
    .await
    .context("Failed to read settings")
}

pub async fn update_settings(pool: &SqlitePool, channel: &str, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE settings SET required_channel = ?1, check_subscription = ?2 WHERE id = 1")
        .bind(channel)
        .bind(enabled)
        .execute(pool)
        .await
        .context("Failed to update settings")?;
    info!(channel = %channel, enabled, "Settings updated");
    Ok(())
}

// ----------------------------------------------------------------------------
// Withdrawals
// ----------------------------------------------------------------------------

pub async fn add_withdrawal(pool: &SqlitePool, user_id: i64, amount: i64) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO withdrawals (user_id, amount, status, created_at) VALUES (?1, ?2, 'pending', ?3)",
    )
    .bind(user_id)
    .bind(amount)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to create withdrawal")?;

    let id = result.last_insert_rowid();
    info!(withdrawal_id = id, user_id, amount, "Withdrawal requested");
    Ok(id)
}

pub async fn get_pending_withdrawals(pool: &SqlitePool) -> Result<Vec<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        "SELECT id, user_id, amount, status, created_at FROM withdrawals
         WHERE status = 'pending' ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to read pending withdrawals")
}

pub async fn has_pending_withdrawal(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM withdrawals WHERE user_id = ?1 AND status = 'pending'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to check pending withdrawals")?;
    Ok(count > 0)
}

pub async fn get_pending_withdrawal(pool: &SqlitePool, id: i64) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        "SELECT id, user_id, amount, status, created_at FROM withdrawals
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to read withdrawal")
}

/// Move a pending withdrawal to `status`; approval also debits the balance.
///
/// Returns the withdrawal as it was while pending, or `None` if it was
/// already processed.
pub async fn decide_withdrawal(
    pool: &SqlitePool,
    id: i64,
    status: WithdrawalStatus,
) -> Result<Option<Withdrawal>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        "SELECT id, user_id, amount, status, created_at FROM withdrawals
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to read withdrawal")?;

    let Some(withdrawal) = withdrawal else {
        tx.rollback().await.context("Failed to roll back withdrawal decision")?;
        return Ok(None);
    };

    sqlx::query("UPDATE withdrawals SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update withdrawal status")?;

    if status == WithdrawalStatus::Approved {
        sqlx::query("UPDATE users SET balance = balance - ?1 WHERE id = ?2")
            .bind(withdrawal.amount)
            .bind(withdrawal.user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to debit balance")?;
    }

    tx.commit().await.context("Failed to commit withdrawal decision")?;
    info!(withdrawal_id = id, status = status.as_str(), "Withdrawal processed");
    Ok(Some(withdrawal))
}

// ----------------------------------------------------------------------------
// Store implementation
// ----------------------------------------------------------------------------

/// All storage traits over one SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CandidateStore for SqliteStore {
    async fn list_candidates(&self) -> Result<Vec<String>> {
        get_all_responses(&self.pool).await
    }

    async fn append(&self, texts: &[String]) -> Result<usize> {
        add_responses_bulk(&self.pool, texts).await
    }

    async fn clear(&self) -> Result<()> {
        clear_all_responses(&self.pool).await
    }

    async fn count(&self) -> Result<i64> {
        count_responses(&self.pool).await
    }
}

#[async_trait]
impl QaStore for SqliteStore {
    async fn list_pairs(&self) -> Result<Vec<QaPair>> {
        get_qa_pairs(&self.pool).await
    }

    async fn insert_pairs(&self, pairs: &[QaPair]) -> Result<usize> {
        insert_qa_pairs(&self.pool, pairs).await
    }

    async fn clear_pairs(&self) -> Result<()> {
        clear_qa_pairs(&self.pool).await
    }

    async fn count_pairs(&self) -> Result<i64> {
        count_qa_pairs(&self.pool).await
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append_turn(&self, user_id: i64, role: Role, text: &str) -> Result<()> {
        append_turn(&self.pool, user_id, role, text).await
    }

    async fn recent_turns(&self, user_id: i64, limit: usize) -> Result<Vec<ConversationTurn>> {
        recent_turns(&self.pool, user_id, limit).await
    }
}

#[async_trait]
impl ConnectionStore for SqliteStore {
    async fn get_owner(&self, connection_id: &str) -> Result<Option<i64>> {
        get_connection_owner(&self.pool, connection_id).await
    }

    async fn set_owner(&self, connection_id: &str, owner_id: i64) -> Result<()> {
        set_connection_owner(&self.pool, connection_id, owner_id).await
    }

    async fn delete(&self, connection_id: &str) -> Result<bool> {
        delete_connection(&self.pool, connection_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> Result<SqlitePool> {
        let pool = connect_in_memory().await?;
        init_database_schema(&pool).await?;
        Ok(pool)
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() -> Result<()> {
        let pool = setup_test_db().await?;
        init_database_schema(&pool).await?;
        let settings = get_settings(&pool).await?;
        assert_eq!(settings.required_channel, "");
        assert!(!settings.check_subscription);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_insert_skips_blank_lines() -> Result<()> {
        let pool = setup_test_db().await?;
        let lines = vec!["  hello  ".to_string(), "   ".to_string(), "world".to_string()];
        assert_eq!(add_responses_bulk(&pool, &lines).await?, 2);
        assert_eq!(get_all_responses(&pool).await?, vec!["hello", "world"]);
        assert_eq!(count_responses(&pool).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_turns_oldest_first() -> Result<()> {
        let pool = setup_test_db().await?;
        for i in 0..5 {
            append_turn(&pool, 7, Role::User, &format!("message {i}")).await?;
        }
        append_turn(&pool, 8, Role::User, "other user").await?;

        let turns = recent_turns(&pool, 7, 3).await?;
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
        Ok(())
    }
}
