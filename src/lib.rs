//! # GitSage
//!
//! Repository ingestion and retrieval for code-aware question answering.
//!
//! GitSage splits a repository into language-aware chunks, embeds code and
//! prose in two separate vector spaces, stores both in SQLite, and answers
//! queries by merging the two spaces into one ranked list. On top of that
//! retrieval core sit question answering, documentation generation, and
//! repository comparison.
//!
//! The retrieval logic itself lives in `gitsage-core`; this crate holds the
//! adapters and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | Persistent [`VectorStore`](gitsage_core::store::VectorStore) |
//! | [`embedding`] | Embedding backends (hashing, OpenAI, Ollama, fastembed) |
//! | [`generate`] | Generation backends (OpenAI-compatible chat, disabled) |
//! | [`source`] | Local directory and git clone repository sources |
//! | [`app`] | Composition root shared by every command |
//! | [`ingest`], [`search`], [`ask`], [`docs`], [`compare`], [`stats`] | CLI commands |

pub mod app;
pub mod ask;
pub mod compare;
pub mod config;
pub mod db;
pub mod docs;
pub mod embedding;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod source;
pub mod sqlite_store;
pub mod stats;
