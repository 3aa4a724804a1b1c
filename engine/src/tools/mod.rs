//! External capabilities the worker can reach
//!
//! - `PubMedClient`: literature search through NCBI Entrez
//! - `MyGeneClient`: gene annotation lookups on mygene.info
//! - `ProcessSandbox`: runs model-written scripts when explicitly enabled
//!
//! Each sits behind a trait so the orchestration loop can be exercised with
//! in-process fakes.

use async_trait::async_trait;
use sdk::errors::EngineError;

pub mod mygene;
pub mod pubmed;
pub mod sandbox;

pub use mygene::MyGeneClient;
pub use pubmed::PubMedClient;
pub use sandbox::ProcessSandbox;

/// Biomedical literature search returning one text block per article
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    async fn search_articles(&self, query: &str) -> Result<Vec<String>, EngineError>;
}

/// Gene annotation lookup returning a readable digest
#[async_trait]
pub trait GeneLookup: Send + Sync {
    async fn lookup(&self, term: &str) -> Result<String, EngineError>;
}

/// Executes generated code and returns its captured output
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> Result<String, EngineError>;
}

/// Map a transport failure from one of the public biomedical APIs.
pub(crate) fn transport_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout
    } else {
        EngineError::Network(err.to_string())
    }
}

/// Map a non-success status from one of the public biomedical APIs.
pub(crate) fn status_error(service: &str, status: reqwest::StatusCode, body: &str) -> EngineError {
    if status.as_u16() == 429 {
        return EngineError::RateLimited;
    }
    let body: String = body.chars().take(200).collect();
    EngineError::Literature(format!("{} returned {}: {}", service, status, body))
}
