//! # Counsel Harness
//!
//! The retrieval-augmented answering core of a legal-assistance backend:
//! a BM25 lexical index over a Vietnamese law-article corpus, a process-wide
//! refreshable snapshot, prompt assembly with conversation memory, and a
//! streaming completion pipeline that appends an integrity stamp to every
//! answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌───────────────┐
//! │  SQLite    │──▶│ KnowledgeBase │──▶│   Retriever    │
//! │ law corpus │   │ (BM25 snap-   │   │ (top-k, tied  │
//! └────────────┘   │  shot, swap)  │   │ by corpus ord)│
//!                  └───────────────┘   └──────┬────────┘
//!                                             ▼
//!   ┌────────────┐   ┌───────────────┐   ┌──────────────┐
//!   │  memory    │──▶│    prompt     │──▶│   pipeline    │──▶ chunks +
//!   │ (history)  │   │  (assembler)  │   │ (stream+stamp)│    stamp marker
//!   └────────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! counsel init                       # create database schema
//! counsel refresh                    # build the index from law_articles
//! counsel search "tiền lương" --k 3  # inspect retrieval
//! counsel serve                      # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`tokenize`] | Vietnamese syllable/bigram tokenizer |
//! | [`index`] | BM25 snapshot build + scoring |
//! | [`retrieve`] | Top-k retrieval |
//! | [`knowledge`] | Corpus source + snapshot refresh coordinator |
//! | [`memory`] | Conversation history lookup |
//! | [`prompt`] | Context assembly |
//! | [`completion`] | Completion provider abstraction |
//! | [`pipeline`] | Streaming answer pipeline |
//! | [`stamp`] | Integrity stamping |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod completion;
pub mod config;
pub mod db;
pub mod index;
pub mod knowledge;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod server;
pub mod stamp;
pub mod tokenize;
