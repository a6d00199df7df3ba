//! Claim repository.
//!
//! One row per In-Use channel. A missing row is a meaningful state ("no
//! claimant cached"), not an error: callers fall back to the recovery scan.

use super::DbError;
use crate::gateway::{ChannelId, MemberId, MessageId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A channel's cached claim state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub channel_id: ChannelId,
    pub claimant_id: MemberId,
    pub claimed_at: DateTime<Utc>,
    pub last_claimant_message_at: Option<DateTime<Utc>>,
    pub last_other_message_at: Option<DateTime<Utc>>,
    /// False until any non-claimant sends a message in the channel.
    pub answered: bool,
    /// The pinned originating question, if pinning succeeded.
    pub question_message_id: Option<MessageId>,
}

type ClaimRow = (i64, i64, i64, Option<i64>, Option<i64>, i64, Option<i64>);

fn from_row(row: ClaimRow) -> ClaimRecord {
    let (channel, claimant, claimed_at, last_claimant, last_other, answered, question) = row;
    ClaimRecord {
        channel_id: ChannelId(channel as u64),
        claimant_id: MemberId(claimant as u64),
        claimed_at: ts(claimed_at),
        last_claimant_message_at: last_claimant.map(ts),
        last_other_message_at: last_other.map(ts),
        answered: answered != 0,
        question_message_id: question.map(|id| MessageId(id as u64)),
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

const SELECT_COLUMNS: &str = "channel_id, claimant_id, claimed_at, \
     last_claimant_message_at, last_other_message_at, answered, question_message_id";

/// Repository for claim cache access.
pub struct ClaimRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClaimRepository<'a> {
    /// Create a new claim repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the claim for a channel.
    pub async fn save(&self, record: &ClaimRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO help_claims
            (channel_id, claimant_id, claimed_at, last_claimant_message_at,
             last_other_message_at, answered, question_message_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.channel_id.get() as i64)
        .bind(record.claimant_id.get() as i64)
        .bind(record.claimed_at.timestamp())
        .bind(record.last_claimant_message_at.map(|t| t.timestamp()))
        .bind(record.last_other_message_at.map(|t| t.timestamp()))
        .bind(record.answered as i64)
        .bind(record.question_message_id.map(|id| id.get() as i64))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch the claim for a channel, if one is cached.
    pub async fn get(&self, channel: ChannelId) -> Result<Option<ClaimRecord>, DbError> {
        let row = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM help_claims WHERE channel_id = ?"
        ))
        .bind(channel.get() as i64)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Delete the claim for a channel. Returns whether a row existed.
    pub async fn delete(&self, channel: ChannelId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM help_claims WHERE channel_id = ?")
            .bind(channel.get() as i64)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load every cached claim (startup reconciliation).
    pub async fn load_all(&self) -> Result<Vec<ClaimRecord>, DbError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM help_claims ORDER BY claimed_at"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Count how many channels a member currently has claimed.
    pub async fn claims_for_member(&self, member: MemberId) -> Result<u64, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM help_claims WHERE claimant_id = ?")
                .bind(member.get() as i64)
                .fetch_one(self.pool)
                .await?;
        Ok(count as u64)
    }

    /// Record a message from the claimant.
    pub async fn set_last_claimant_message(
        &self,
        channel: ChannelId,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE help_claims SET last_claimant_message_at = ? WHERE channel_id = ?")
            .bind(at.timestamp())
            .bind(channel.get() as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Record a message from someone other than the claimant.
    pub async fn set_last_other_message(
        &self,
        channel: ChannelId,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE help_claims SET last_other_message_at = ? WHERE channel_id = ?")
            .bind(at.timestamp())
            .bind(channel.get() as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Flip the answered flag.
    pub async fn set_answered(&self, channel: ChannelId, answered: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE help_claims SET answered = ? WHERE channel_id = ?")
            .bind(answered as i64)
            .bind(channel.get() as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Store the pinned question message id.
    pub async fn set_question_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE help_claims SET question_message_id = ? WHERE channel_id = ?")
            .bind(message.get() as i64)
            .bind(channel.get() as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
