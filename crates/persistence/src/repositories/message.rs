//! Group message repository for database operations.

use shared::pagination::MessageCursor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::GroupMessageEntity;
use crate::metrics::QueryTimer;

/// Channel used to tell other instances that a transcript grew.
pub const MESSAGE_NOTIFY_CHANNEL: &str = "group_messages";

/// Repository for chat message database operations.
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Creates a new MessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Appends a message if the sender is a member of the room and the room
    /// is still open. Membership is checked by the insert itself, so a sender
    /// removed concurrently cannot slip a message in.
    ///
    /// Returns `None` when the condition fails.
    pub async fn insert_as_member(
        &self,
        group_id: Uuid,
        sender_id: &str,
        text: &str,
    ) -> Result<Option<GroupMessageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_group_message");
        let result = sqlx::query_as::<_, GroupMessageEntity>(
            r#"
            INSERT INTO group_messages (group_id, sender_id, sender_name, sender_photo, text)
            SELECT $1, u.uid, u.display_name, u.photo_url, $3
            FROM users u
            WHERE u.uid = $2
              AND EXISTS (
                  SELECT 1
                  FROM group_members gm
                  JOIN discussion_groups g ON g.id = gm.group_id
                  WHERE gm.group_id = $1 AND gm.user_id = $2 AND g.status <> 'completed'
              )
            RETURNING id, group_id, seq, sender_id, sender_name, sender_photo, text, created_at
            "#,
        )
        .bind(group_id)
        .bind(sender_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Publishes an append notification for the room to every listener.
    pub async fn notify_appended(&self, group_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(MESSAGE_NOTIFY_CHANNEL)
            .bind(group_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transcript in `(created_at, seq)` order, optionally after a position.
    pub async fn list_for_group(
        &self,
        group_id: Uuid,
        after: Option<&MessageCursor>,
    ) -> Result<Vec<GroupMessageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_messages");
        let result = match after {
            Some(cursor) => {
                sqlx::query_as::<_, GroupMessageEntity>(
                    r#"
                    SELECT id, group_id, seq, sender_id, sender_name, sender_photo, text, created_at
                    FROM group_messages
                    WHERE group_id = $1 AND (created_at, seq) > ($2, $3)
                    ORDER BY created_at ASC, seq ASC
                    "#,
                )
                .bind(group_id)
                .bind(cursor.created_at)
                .bind(cursor.seq)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, GroupMessageEntity>(
                    r#"
                    SELECT id, group_id, seq, sender_id, sender_name, sender_photo, text, created_at
                    FROM group_messages
                    WHERE group_id = $1
                    ORDER BY created_at ASC, seq ASC
                    "#,
                )
                .bind(group_id)
                .fetch_all(&self.pool)
                .await
            }
        };
        timer.record();
        result
    }
}
