//! Core data models used throughout Counsel Harness.
//!
//! These types represent the corpus documents, conversation turns, and
//! retrieval results that flow through the answering pipeline.

use serde::{Deserialize, Serialize};

/// A single law article from the corpus store.
///
/// Immutable once it is part of an [`crate::index::IndexSnapshot`]; a new
/// snapshot carries fresh copies loaded at refresh time.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusDocument {
    /// Opaque identifier from the corpus store (row id as text).
    pub id: String,
    /// Optional article title.
    pub title: Option<String>,
    /// Full article text. Never empty for documents admitted to a snapshot.
    pub text: String,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn of a conversation, read from the memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// A scored document returned by the retriever.
///
/// Results are ordered descending by score; equal scores keep the original
/// corpus order.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub document: CorpusDocument,
    pub score: f64,
}
