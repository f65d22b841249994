use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;

    // Law-article corpus consumed by the knowledge refresh
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS law_articles (
            id INTEGER PRIMARY KEY,
            title TEXT,
            content TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Conversation memory rows; history lives in role='memory' rows as a
    // JSON array of {role, content} turns
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, role)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
