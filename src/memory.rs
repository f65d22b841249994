//! Conversation memory lookup.
//!
//! The memory store is owned by an external collaborator; this core only
//! reads prior turns for a conversation identifier. History is persisted as
//! one `messages` row per conversation with `role = 'memory'` whose content
//! column holds a JSON array of `{role, content}` turns. Malformed content
//! degrades to an empty history at the call site — it never fails a chat
//! request.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::models::ConversationTurn;

/// Read-only access to prior conversation turns.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Ordered turns for the given conversation; may be empty.
    ///
    /// An `Err` means the store itself was unreachable. Callers on the chat
    /// path treat that the same as an empty history.
    async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>>;
}

/// Memory store backed by the shared SQLite database.
pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationMemory for SqliteMemoryStore {
    async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let row = sqlx::query(
            "SELECT content FROM messages WHERE conversation_id = ? AND role = 'memory' LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let content: String = row.get("content");
        Ok(parse_history(&content))
    }
}

/// Parse a JSON history blob into turns, skipping malformed entries.
///
/// Unparseable JSON or a non-array payload yields an empty history;
/// individual entries with an unknown role or missing content are dropped.
pub fn parse_history(content: &str) -> Vec<ConversationTurn> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(content) {
        Ok(values) => values,
        Err(e) => {
            warn!(error = %e, "unparseable conversation memory; treating as empty history");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ConversationTurn>(v).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_parses_well_formed_history() {
        let turns = parse_history(
            r#"[
                {"role": "user", "content": "Hợp đồng thử việc tối đa bao lâu?"},
                {"role": "assistant", "content": "Tối đa 60 ngày với công việc cần trình độ cao đẳng trở lên."}
            ]"#,
        );
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_malformed_json_is_empty_history() {
        assert!(parse_history("not json at all").is_empty());
        assert!(parse_history("{\"role\": \"user\"}").is_empty());
        assert!(parse_history("").is_empty());
    }

    #[test]
    fn test_bad_entries_are_skipped_not_fatal() {
        let turns = parse_history(
            r#"[
                {"role": "user", "content": "câu hỏi"},
                {"role": "memory", "content": "ignored"},
                {"content": "no role"},
                42,
                {"role": "assistant", "content": "trả lời"}
            ]"#,
        );
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "câu hỏi");
        assert_eq!(turns[1].content, "trả lời");
    }

    #[test]
    fn test_empty_array_is_empty_history() {
        assert!(parse_history("[]").is_empty());
    }
}
