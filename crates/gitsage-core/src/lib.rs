//! # GitSage Core
//!
//! Retrieval logic for GitSage: file filtering, language-aware chunking,
//! dual-space embedding routing, the vector store abstraction, the
//! merge-and-rank retriever, and the consumers built on it (Q&A,
//! documentation, comparison).
//!
//! This crate contains no sqlx, filesystem walking, or HTTP clients. Those
//! adapters live in the `gitsage` app crate and plug in through the
//! [`store::VectorStore`], [`embedding::EmbeddingProvider`],
//! [`generate::Generator`] and [`ingest::RepositorySource`] traits.

pub mod chunk;
pub mod compare;
pub mod docs;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod generate;
pub mod ingest;
pub mod models;
pub mod qa;
pub mod retrieve;
pub mod router;
pub mod store;
pub mod summary;
