//! Process-wide knowledge base: corpus loading and snapshot refresh.
//!
//! [`KnowledgeBase`] owns the current [`IndexSnapshot`] and supports
//! replacing it atomically. Retrievals capture an `Arc` to the snapshot at
//! call start and keep using it even if a refresh swaps in a newer one
//! mid-flight; the superseded snapshot is dropped once the last in-flight
//! retrieval releases it. A failed refresh leaves the previous snapshot
//! authoritative — the system is never left without an index.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::index::{Bm25Params, IndexSnapshot};
use crate::models::CorpusDocument;
use crate::tokenize::Tokenizer;

/// A store queryable for all documents with non-empty text.
///
/// Consumed only by [`KnowledgeBase::refresh`]; implementations may read
/// from SQLite, a remote service, or a test fixture.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn load(&self) -> Result<Vec<CorpusDocument>>;
}

/// Loads law articles from the `law_articles` table.
pub struct SqliteCorpusSource {
    pool: SqlitePool,
}

impl SqliteCorpusSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CorpusSource for SqliteCorpusSource {
    async fn load(&self) -> Result<Vec<CorpusDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content
            FROM law_articles
            WHERE content IS NOT NULL AND length(trim(content)) > 0
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let documents = rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                CorpusDocument {
                    id: id.to_string(),
                    title: row.get("title"),
                    text: row.get("content"),
                }
            })
            .collect();

        Ok(documents)
    }
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RefreshOutcome {
    /// Number of documents in the newly published snapshot.
    pub documents: usize,
}

/// Holder of the current index snapshot for the whole process.
///
/// Constructed explicitly and injected where needed; there is no implicit
/// global. The lock is only held long enough to clone or replace the `Arc`
/// and is never held across an await point, so snapshot reads never block
/// behind a rebuild.
pub struct KnowledgeBase {
    source: Arc<dyn CorpusSource>,
    tokenizer: Arc<dyn Tokenizer>,
    params: Bm25Params,
    current: RwLock<Arc<IndexSnapshot>>,
}

impl KnowledgeBase {
    /// Create a knowledge base starting from an empty snapshot.
    ///
    /// Call [`refresh`](Self::refresh) to load the corpus; starting empty
    /// keeps construction infallible and non-blocking.
    pub fn new(
        source: Arc<dyn CorpusSource>,
        tokenizer: Arc<dyn Tokenizer>,
        params: Bm25Params,
    ) -> Self {
        let empty = Arc::new(IndexSnapshot::empty(params));
        Self {
            source,
            tokenizer,
            params,
            current: RwLock::new(empty),
        }
    }

    /// Read-only handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reload the corpus, build a fresh snapshot, and publish it.
    ///
    /// If the reload fails or yields zero valid documents, the previous
    /// snapshot stays in place and the error is reported to the caller.
    /// Safe to call concurrently with in-flight retrievals; retrievals
    /// already holding a snapshot are unaffected.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let documents = match self.source.load().await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "corpus reload failed; keeping previous snapshot");
                return Err(e.context("corpus reload failed"));
            }
        };

        if documents.is_empty() {
            warn!("corpus reload returned no usable documents; keeping previous snapshot");
            bail!("corpus contains no documents with non-empty text");
        }

        let snapshot = Arc::new(IndexSnapshot::build(
            documents,
            self.tokenizer.as_ref(),
            self.params,
        ));
        let count = snapshot.len();

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = snapshot;
        drop(current);

        info!(documents = count, "published new index snapshot");
        Ok(RefreshOutcome { documents: count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::SyllableTokenizer;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedSource {
        docs: Vec<CorpusDocument>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl CorpusSource for FixedSource {
        async fn load(&self) -> Result<Vec<CorpusDocument>> {
            if self.fail.load(Ordering::SeqCst) {
                bail!("storage unavailable");
            }
            Ok(self.docs.clone())
        }
    }

    fn doc(id: &str, text: &str) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            title: None,
            text: text.to_string(),
        }
    }

    fn knowledge(source: Arc<FixedSource>) -> KnowledgeBase {
        KnowledgeBase::new(source, Arc::new(SyllableTokenizer), Bm25Params::default())
    }

    #[tokio::test]
    async fn test_starts_empty_then_refreshes() {
        let source = Arc::new(FixedSource {
            docs: vec![doc("1", "điều một"), doc("2", "điều hai")],
            fail: AtomicBool::new(false),
        });
        let kb = knowledge(source);

        assert!(kb.snapshot().is_empty());
        let outcome = kb.refresh().await.unwrap();
        assert_eq!(outcome.documents, 2);
        assert_eq!(kb.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FixedSource {
            docs: vec![doc("1", "điều một")],
            fail: AtomicBool::new(false),
        });
        let kb = knowledge(source.clone());

        kb.refresh().await.unwrap();
        let before = kb.snapshot();

        source.fail.store(true, Ordering::SeqCst);
        assert!(kb.refresh().await.is_err());

        let after = kb.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reload_is_a_refresh_failure() {
        let source = Arc::new(FixedSource {
            docs: vec![],
            fail: AtomicBool::new(false),
        });
        let kb = knowledge(source);
        assert!(kb.refresh().await.is_err());
        assert!(kb.snapshot().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_never_tears_retrievals() {
        use crate::retrieve::retrieve;
        use std::sync::atomic::AtomicUsize;

        // Alternates between a 2-document and a 5-document corpus so every
        // swap changes both the documents and the term statistics.
        struct AlternatingSource {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl CorpusSource for AlternatingSource {
            async fn load(&self) -> Result<Vec<CorpusDocument>> {
                let n = if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                    2
                } else {
                    5
                };
                Ok((0..n)
                    .map(|i| doc(&i.to_string(), &format!("điều {} về tiền lương", i)))
                    .collect())
            }
        }

        let kb = Arc::new(KnowledgeBase::new(
            Arc::new(AlternatingSource {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(SyllableTokenizer),
            Bm25Params::default(),
        ));
        kb.refresh().await.unwrap();

        let refresher = {
            let kb = kb.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    kb.refresh().await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let kb = kb.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let snap = kb.snapshot();
                        let len = snap.len();
                        // Only fully built snapshots are ever published.
                        assert!(len == 2 || len == 5, "unexpected snapshot size {}", len);

                        let hits = retrieve(&snap, &SyllableTokenizer, "lương", len);
                        assert_eq!(hits.len(), len);
                        assert!(hits.iter().all(|h| h.score > 0.0));

                        // The captured snapshot stays internally consistent
                        // even if a refresh swapped underneath meanwhile.
                        assert_eq!(snap.len(), len);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        refresher.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_inflight_snapshot_survives_swap() {
        let source = Arc::new(FixedSource {
            docs: vec![doc("1", "điều một")],
            fail: AtomicBool::new(false),
        });
        let kb = knowledge(source);
        kb.refresh().await.unwrap();

        // A retrieval captures its snapshot, then a refresh swaps underneath.
        let captured = kb.snapshot();
        kb.refresh().await.unwrap();

        assert_eq!(captured.len(), 1);
        assert!(!Arc::ptr_eq(&captured, &kb.snapshot()));
    }
}
