//! Insight Engine Library
//!
//! This library provides the core functionality of the Insight agent.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// LLM provider abstraction layer
pub mod llm;

/// Embeddings, vector index and executive-summary index
pub mod knowledge;

/// PubMed, MyGene and the code sandbox
pub mod tools;

/// Conductor orchestration module
pub mod conductor;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
