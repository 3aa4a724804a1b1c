//! Worker
//!
//! Executes one task per cycle, routed by the task's kind:
//! - `PubMed`: model writes a search query, Entrez returns abstracts
//! - `MyGene`: model writes a Python script (execution enabled) or a query
//!   term for the native MyGene client (execution disabled)
//! - `General`: a single reasoning call

use crate::llm::{extract_fenced_block, LLMProvider, Message};
use crate::tools::{GeneLookup, LiteratureSearch};
use sdk::errors::EngineError;
use sdk::types::{Task, TaskKind, WorkerOutput};
use std::sync::Arc;
use tracing::{debug, info};

pub const WORKER_SYSTEM_PROMPT: &str = "\
You are a diligent research assistant working toward an objective. Complete the task \
you are given using your own knowledge and the context from earlier tasks. Be specific \
and cite the evidence you rely on.";

pub const PUBMED_QUERY_SYSTEM_PROMPT: &str = "\
You turn research tasks into PubMed search queries. Reply with ONE concise query using \
PubMed syntax (keywords, quoted phrases, AND/OR). Reply with the query only.";

pub const MYGENE_QUERY_SYSTEM_PROMPT: &str = "\
You turn research tasks into queries for the mygene.info gene query service. Reply with \
ONE short query term: a gene symbol, a disease name or a few keywords. Reply with the \
query only.";

pub const MYGENE_CODE_SYSTEM_PROMPT: &str = "\
You write Python 3 scripts that query the mygene.info REST API (https://mygene.info/v3) \
using only the standard library (urllib.request, json). The script must print a \
readable summary of what it finds to stdout and must not read input or files. Reply \
with the script in a single ```python code block.";

pub struct Worker {
    llm: Arc<dyn LLMProvider>,
    literature: Arc<dyn LiteratureSearch>,
    genes: Arc<dyn GeneLookup>,
    code_enabled: bool,
}

/// First non-empty line with surrounding quotes and prefixes removed.
fn clean_query(reply: &str, fallback: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");
    let line = line
        .strip_prefix("Query:")
        .or_else(|| line.strip_prefix("query:"))
        .unwrap_or(line)
        .trim()
        .trim_matches(|c| c == '"' || c == '`' || c == '\'')
        .trim();

    if line.is_empty() {
        fallback.to_string()
    } else {
        line.to_string()
    }
}

impl Worker {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        literature: Arc<dyn LiteratureSearch>,
        genes: Arc<dyn GeneLookup>,
    ) -> Self {
        Self {
            llm,
            literature,
            genes,
            code_enabled: false,
        }
    }

    /// Let MyGene tasks produce scripts for the code sandbox
    pub fn with_code_execution(mut self, enabled: bool) -> Self {
        self.code_enabled = enabled;
        self
    }

    fn task_prompt(objective: &str, task: &Task, context: &str) -> String {
        let context = if context.trim().is_empty() {
            "None"
        } else {
            context
        };
        format!(
            "OBJECTIVE: {}\n\nCONTEXT FROM PREVIOUS TASKS:\n{}\n\nYOUR TASK: {}",
            objective, context, task.description
        )
    }

    async fn ask(&self, system: &str, user: String) -> Result<String, EngineError> {
        Ok(self
            .llm
            .generate(&[Message::system(system), Message::user(user)])
            .await?)
    }

    pub async fn execute(
        &self,
        objective: &str,
        task: &Task,
        context: &str,
    ) -> Result<WorkerOutput, EngineError> {
        info!(kind = %task.kind, "Worker executing task");
        let prompt = Self::task_prompt(objective, task, context);

        match task.kind {
            TaskKind::General => {
                let answer = self.ask(WORKER_SYSTEM_PROMPT, prompt).await?;
                Ok(WorkerOutput::Text(answer))
            }
            TaskKind::PubMed => {
                let reply = self.ask(PUBMED_QUERY_SYSTEM_PROMPT, prompt).await?;
                let query = clean_query(&reply, &task.description);
                debug!(query = %query, "PubMed query");

                let articles = self.literature.search_articles(&query).await?;
                if articles.is_empty() {
                    Ok(WorkerOutput::Text(format!(
                        "No PubMed articles found for query: {}",
                        query
                    )))
                } else {
                    Ok(WorkerOutput::Articles(articles))
                }
            }
            TaskKind::MyGene if self.code_enabled => {
                let reply = self.ask(MYGENE_CODE_SYSTEM_PROMPT, prompt).await?;
                let code = extract_fenced_block(&reply).unwrap_or(&reply).trim().to_string();
                Ok(WorkerOutput::Code(code))
            }
            TaskKind::MyGene => {
                let reply = self.ask(MYGENE_QUERY_SYSTEM_PROMPT, prompt).await?;
                let term = clean_query(&reply, &task.description);
                debug!(term = %term, "MyGene query");
                Ok(WorkerOutput::Text(self.genes.lookup(&term).await?))
            }
        }
    }
}
