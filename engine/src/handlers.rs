//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Drive the agent loop until the iteration cap or idle stop
//! - init-index: Create the vector index if it does not exist
//! - doctor: Validate configuration and check credentials and services

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::conductor::{
    BossPlanner, Orchestrator, OrchestratorSettings, Reporter, ResultCleaner, RunSummary, Worker,
};
use crate::config::{Config, KnowledgeBackend};
use crate::knowledge::{
    InMemoryIndex, KnowledgeStore, OpenAIEmbedder, PineconeIndex, SummaryIndex, VectorIndex,
};
use crate::llm::openai::OpenAIProvider;
use crate::llm::LLMProvider;
use crate::secrets::{
    SecretCache, SecretManager, EMAIL, OPENAI_API_KEY, PINECONE_API_KEY, PINECONE_ENV,
};
use crate::telemetry;
use crate::tools::{CodeRunner, MyGeneClient, ProcessSandbox, PubMedClient};

/// Keychain service name credentials are stored under
const SERVICE_NAME: &str = "insight";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Credentials a run with this configuration cannot start without
pub fn required_credentials(config: &Config) -> Vec<&'static str> {
    let mut keys = vec![OPENAI_API_KEY, EMAIL];
    if config.knowledge.backend == KnowledgeBackend::Pinecone {
        keys.push(PINECONE_API_KEY);
        if config.knowledge.controller_url.is_none() {
            keys.push(PINECONE_ENV);
        }
    }
    keys
}

fn secret_cache() -> SecretCache {
    SecretCache::new(Arc::new(SecretManager::new(SERVICE_NAME)))
}

fn request_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.llm.request_timeout_secs)
}

/// Vector index for the configured backend
fn build_index(config: &Config, secrets: &SecretCache) -> Result<Arc<dyn VectorIndex>> {
    let dimension = config.embedding.dimension;
    let index: Arc<dyn VectorIndex> = match config.knowledge.backend {
        KnowledgeBackend::Pinecone => Arc::new(
            PineconeIndex::new(&config.knowledge, dimension, secrets, request_timeout(config))
                .context("Failed to configure Pinecone")?,
        ),
        KnowledgeBackend::Memory => {
            tracing::warn!("Using the in-memory index; results are lost on exit");
            Arc::new(InMemoryIndex::new(config.knowledge.index_name.clone(), dimension))
        }
    };
    Ok(index)
}

/// Apply command-line overrides to the loaded configuration
pub fn apply_run_overrides(
    config: &Config,
    objective: Option<String>,
    max_iterations: Option<u32>,
) -> Result<Config> {
    let mut config = config.clone();
    if let Some(objective) = objective {
        config.agent.objective = objective;
    }
    if let Some(max_iterations) = max_iterations {
        config.agent.max_iterations = max_iterations;
    }
    config.validate().context("Invalid run options")?;
    Ok(config)
}

/// Persist a finished run's summary as `<data_dir>/runs/<run_id>.json`
pub fn write_run_summary(data_dir: &Path, run_id: &str, summary: &RunSummary) -> Result<PathBuf> {
    let runs_dir = data_dir.join("runs");
    std::fs::create_dir_all(&runs_dir)
        .with_context(|| format!("Failed to create {}", runs_dir.display()))?;

    let path = runs_dir.join(format!("{}.json", run_id));
    let body = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Run the agent loop
///
/// Every credential the configuration needs is resolved before the first
/// cycle, so a missing key aborts the run up front.
pub async fn handle_run(
    config: &Config,
    objective: Option<String>,
    max_iterations: Option<u32>,
    quiet: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = apply_run_overrides(config, objective, max_iterations)?;

    let secrets = secret_cache();
    secrets
        .preload(&required_credentials(&config))
        .context("Missing credentials")?;
    let shared_secrets = Arc::new(secrets.clone());

    let llm: Arc<dyn LLMProvider> = Arc::new(
        OpenAIProvider::new(config.llm.clone(), shared_secrets.clone())
            .context("Failed to configure the chat model")?,
    );
    let embedder = Arc::new(
        OpenAIEmbedder::new(
            config.embedding.clone(),
            shared_secrets.clone(),
            request_timeout(&config),
        )
        .context("Failed to configure embeddings")?,
    );

    let index = build_index(&config, &secrets)?;
    let knowledge = Arc::new(KnowledgeStore::new(embedder, index)?);
    knowledge
        .initialize()
        .await
        .context("Failed to initialize the vector index")?;

    let retrieval = Arc::new(SummaryIndex::new(llm.clone(), config.llm.max_input_chars));

    let email = secrets.get_secret(EMAIL)?;
    let pubmed = Arc::new(PubMedClient::new(
        &config.pubmed,
        email.expose(),
        request_timeout(&config),
    )?);
    let mygene = Arc::new(MyGeneClient::new(&config.mygene, request_timeout(&config))?);
    let sandbox = ProcessSandbox::from_config(&config.execution);

    let mut planner = BossPlanner::new(llm.clone())
        .with_completed_window(config.agent.completed_tasks_in_prompt);
    if let Some(description) = &config.agent.tool_description {
        planner = planner.with_tool_description(description.clone());
    }
    let worker = Worker::new(llm.clone(), pubmed, mygene).with_code_execution(sandbox.is_some());
    let cleaner = ResultCleaner::new(llm.clone(), config.llm.max_input_chars);
    let reporter = Reporter::new(Some(secrets.clone())).quiet(quiet);

    let mut orchestrator = Orchestrator::new(
        OrchestratorSettings::from_config(&config.agent),
        planner,
        worker,
        cleaner,
        knowledge,
        retrieval,
        reporter,
    );
    if let Some(sandbox) = sandbox {
        let runner: Arc<dyn CodeRunner> = Arc::new(sandbox);
        orchestrator = orchestrator.with_code_runner(runner);
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        run_id = %run_id,
        model = %llm.name(),
        index = %config.knowledge.index_name,
        "Starting agent run"
    );

    let summary = orchestrator
        .run()
        .instrument(telemetry::run_span(&run_id, &config.agent.objective))
        .await
        .context("Agent run failed")?;

    let summary_path = write_run_summary(&config.core.data_dir, &run_id, &summary)?;
    tracing::info!(path = %summary_path.display(), "Wrote run summary");

    match format {
        OutputFormat::Text => {
            println!();
            println!("Run {} finished ({})", run_id, summary.stop_reason);
            println!("  Cycles completed: {}", summary.cycles_completed);
            println!("  Idle cycles:      {}", summary.idle_cycles);
            println!("  Summary file:     {}", summary_path.display());
            if !summary.completed_tasks.is_empty() {
                println!();
                println!("Completed tasks:");
                for (i, task) in summary.completed_tasks.iter().enumerate() {
                    println!("  {}. {}", i + 1, secrets.scrub(task));
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "run_id": run_id,
                "summary": summary,
                "summary_file": summary_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Create the configured vector index if it does not exist
pub async fn handle_init_index(config: &Config, format: OutputFormat) -> Result<()> {
    let secrets = secret_cache();
    if config.knowledge.backend == KnowledgeBackend::Pinecone {
        let mut keys = vec![PINECONE_API_KEY];
        if config.knowledge.controller_url.is_none() {
            keys.push(PINECONE_ENV);
        }
        secrets.preload(&keys).context("Missing credentials")?;
    }

    let index = build_index(config, &secrets)?;
    index
        .ensure_index()
        .await
        .with_context(|| format!("Failed to initialize index '{}'", index.name()))?;

    match format {
        OutputFormat::Text => {
            println!(
                "Index '{}' is ready (dimension {}, metric {})",
                index.name(),
                index.dimension(),
                config.knowledge.metric
            );
        }
        OutputFormat::Json => {
            let output = json!({
                "index": index.name(),
                "dimension": index.dimension(),
                "metric": config.knowledge.metric,
                "ready": true
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Validate configuration and check credentials and services
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Check 1: Configuration validation
    match config.validate() {
        Ok(()) => checks.push(("Configuration".into(), "Valid".into())),
        Err(e) => {
            checks.push(("Configuration".into(), "Invalid".into()));
            issues.push(e.to_string());
        }
    }

    // Check 2: Data directory
    if config.core.data_dir.exists() {
        checks.push(("Data directory".into(), "Exists".into()));
    } else {
        checks.push(("Data directory".into(), "Missing".into()));
        issues.push(format!(
            "Data directory does not exist: {:?}",
            config.core.data_dir
        ));
    }

    // Check 3: Credentials
    let secrets = secret_cache();
    let mut credentials_ok = true;
    for key in required_credentials(config) {
        if secrets.get_secret(key).is_ok() {
            checks.push((key.to_string(), "Configured".into()));
        } else {
            credentials_ok = false;
            checks.push((key.to_string(), "Not configured".into()));
            issues.push(format!(
                "{} is not set. Export it or store it in the '{}' keychain.",
                key, SERVICE_NAME
            ));
        }
    }

    // Check 4: Vector index
    match config.knowledge.backend {
        KnowledgeBackend::Memory => {
            checks.push(("Vector index".into(), "In-memory (not persisted)".into()));
        }
        KnowledgeBackend::Pinecone if !credentials_ok => {
            checks.push(("Vector index".into(), "Skipped".into()));
        }
        KnowledgeBackend::Pinecone => {
            match PineconeIndex::new(
                &config.knowledge,
                config.embedding.dimension,
                &secrets,
                request_timeout(config),
            ) {
                Ok(index) => match index.exists().await {
                    Ok(true) => checks.push(("Vector index".into(), "Exists".into())),
                    Ok(false) => {
                        checks.push(("Vector index".into(), "Not created".into()));
                        issues.push(format!(
                            "Index '{}' does not exist. Run 'insight init-index' or start a run to create it.",
                            config.knowledge.index_name
                        ));
                    }
                    Err(e) => {
                        checks.push(("Vector index".into(), "Unreachable".into()));
                        issues.push(format!("Cannot reach Pinecone: {}", secrets.scrub(&e.to_string())));
                    }
                },
                Err(e) => {
                    checks.push(("Vector index".into(), "Misconfigured".into()));
                    issues.push(e.to_string());
                }
            }
        }
    }

    // Check 5: Code execution
    if config.execution.enabled {
        checks.push((
            "Code execution".into(),
            format!("Enabled ({})", config.execution.interpreter),
        ));
    } else {
        checks.push(("Code execution".into(), "Disabled".into()));
    }

    // Output results
    match format {
        OutputFormat::Text => {
            println!("Insight System Diagnostics");
            println!("============================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::StopReason;

    #[test]
    fn test_required_credentials_follow_backend() {
        let mut config = Config::default_config();
        assert_eq!(
            required_credentials(&config),
            vec![OPENAI_API_KEY, EMAIL, PINECONE_API_KEY, PINECONE_ENV]
        );

        config.knowledge.controller_url = Some("http://127.0.0.1:9000".to_string());
        assert_eq!(
            required_credentials(&config),
            vec![OPENAI_API_KEY, EMAIL, PINECONE_API_KEY]
        );

        config.knowledge.backend = KnowledgeBackend::Memory;
        assert_eq!(required_credentials(&config), vec![OPENAI_API_KEY, EMAIL]);
    }

    #[test]
    fn test_run_overrides_are_validated() {
        let config = Config::default_config();

        let overridden =
            apply_run_overrides(&config, Some("Map BRCA1 interactions".to_string()), Some(4))
                .unwrap();
        assert_eq!(overridden.agent.objective, "Map BRCA1 interactions");
        assert_eq!(overridden.agent.max_iterations, 4);

        assert!(apply_run_overrides(&config, None, Some(0)).is_err());
        assert!(apply_run_overrides(&config, Some("  ".to_string()), None).is_err());
    }

    #[test]
    fn test_write_run_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary {
            cycles_completed: 2,
            completed_tasks: vec!["PUBMED: BRCA1".to_string(), "Summarize".to_string()],
            idle_cycles: 0,
            stop_reason: StopReason::IterationCap,
        };

        let path = write_run_summary(dir.path(), "run-1", &summary).unwrap();
        assert_eq!(path, dir.path().join("runs").join("run-1.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["cycles_completed"], 2);
        assert_eq!(written["stop_reason"], "iteration_cap");
        assert_eq!(written["completed_tasks"][0], "PUBMED: BRCA1");
    }
}
