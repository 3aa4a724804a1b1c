//! Boss Planner
//!
//! Rebuilds the task queue every cycle from the objective, the tool
//! catalogue, the executive summary and the work done so far. The model is
//! asked for a JSON object; older free-form styles (a bare JSON array, a
//! numbered list with `PUBMED:`/`MYGENE:` prefixes) are still accepted.

use crate::conductor::queue::{CompletedTasks, TaskQueue};
use crate::llm::{extract_fenced_block, LLMError, LLMProvider, Message};
use regex::Regex;
use sdk::errors::EngineError;
use sdk::types::{Task, TaskKind};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Capabilities advertised to the planner
pub const TOOL_DESCRIPTION: &str = "\
1) Query mygene API. This is useful for finding information on genes that are associated with diseases. If you wish to make a task to create an API request to mygene then use kind \"MYGENE\" and describe what you would like to search for. Example: {\"kind\": \"MYGENE\", \"description\": \"look up information on genes that are linked to cancer\"}
2) Query PubMed API. This is useful for searching biomedical literature citations and abstracts. If you wish to make a task to create an API request to the PubMed API then use kind \"PUBMED\" and describe what you would like to search for.";

pub const PLANNER_SYSTEM_PROMPT: &str = "\
You are the boss of a research team working toward an objective. You plan the work; \
workers carry it out one task at a time, in the order you give.

Every cycle you receive the objective, the tools your workers can use, an executive \
summary of results so far, the tasks already completed and the current task list. \
Return the COMPLETE updated task list: keep useful pending tasks, drop ones that are \
no longer needed, and add new tasks that move the objective forward. Do not repeat \
completed tasks.

Respond with ONLY a JSON object of this shape:
{\"thoughts\": \"<your reasoning>\", \"tasks\": [{\"kind\": \"GENERAL\" | \"MYGENE\" | \"PUBMED\", \"description\": \"<task>\"}]}";

/// A freshly planned task list with the planner's reasoning
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub tasks: Vec<Task>,
    pub thoughts: String,
}

/// Everything the planner looks at in one cycle
pub struct PlanningInput<'a> {
    pub objective: &'a str,
    pub queue: &'a TaskQueue,
    pub executive_summary: &'a str,
    pub completed: &'a CompletedTasks,
}

pub struct BossPlanner {
    llm: Arc<dyn LLMProvider>,
    tool_description: String,
    completed_window: Option<usize>,
}

/// `tasks` is required so a lone task object never reads as an empty plan.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    thoughts: String,
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTask {
    Text(String),
    Structured {
        kind: Option<String>,
        description: String,
    },
}

impl RawTask {
    fn into_task(self) -> Result<Option<Task>, LLMError> {
        let task = match self {
            RawTask::Text(text) => Task::from_prefixed(&text),
            RawTask::Structured { kind, description } => {
                let kind = match kind.as_deref() {
                    Some(k) => TaskKind::from_str(k)
                        .map_err(|e: EngineError| LLMError::ParseError(e.to_string()))?,
                    None => TaskKind::General,
                };
                let from_text = Task::from_prefixed(&description);
                if kind == TaskKind::General || from_text.kind == kind {
                    from_text
                } else {
                    Task::new(kind, description)
                }
            }
        };

        if task.description.is_empty() {
            Ok(None)
        } else {
            Ok(Some(task))
        }
    }
}

fn list_marker() -> &'static Regex {
    static LIST_MARKER: OnceLock<Regex> = OnceLock::new();
    LIST_MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+)$").expect("Invalid list marker pattern")
    })
}

fn collect_tasks(raw: Vec<RawTask>) -> Result<Vec<Task>, LLMError> {
    let mut tasks = Vec::with_capacity(raw.len());
    for item in raw {
        if let Some(task) = item.into_task()? {
            tasks.push(task);
        }
    }
    Ok(tasks)
}

/// First JSON plan object in `body`, trying every `{` in turn so braces in
/// surrounding prose are skipped.
fn find_json_plan(body: &str) -> Result<Option<RawPlan>, serde_json::Error> {
    let mut last_err = None;
    for (start, _) in body.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<RawPlan>();
        match stream.next() {
            Some(Ok(raw)) => return Ok(Some(raw)),
            Some(Err(e)) => last_err = Some(e),
            None => {}
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

/// Parse planner output into tasks and free-text thoughts.
pub fn parse_plan(content: &str) -> Result<(Vec<Task>, String), LLMError> {
    let body = extract_fenced_block(content).unwrap_or(content).trim();

    if body.starts_with('[') {
        let mut stream = serde_json::Deserializer::from_str(body).into_iter::<Vec<RawTask>>();
        if let Some(Ok(raw)) = stream.next() {
            return Ok((collect_tasks(raw)?, String::new()));
        }
    }

    let json_err = match find_json_plan(body) {
        Ok(Some(raw)) => {
            let tasks = collect_tasks(raw.tasks)?;
            return Ok((tasks, raw.thoughts.trim().to_string()));
        }
        Ok(None) => None,
        Err(e) => Some(e),
    };

    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(raw) = serde_json::from_str::<Vec<RawTask>>(&body[start..=end]) {
                return Ok((collect_tasks(raw)?, String::new()));
            }
        }
    }

    let listed: Vec<Task> = body
        .lines()
        .filter_map(|line| list_marker().captures(line))
        .filter_map(|caps| caps.get(1).map(|m| Task::from_prefixed(m.as_str())))
        .filter(|task| !task.description.is_empty())
        .collect();

    if listed.is_empty() {
        if let Some(e) = json_err {
            return Err(LLMError::ParseError(format!("Failed to parse plan JSON: {}", e)));
        }
        let preview: String = content.chars().take(120).collect();
        return Err(LLMError::ParseError(format!(
            "Planner output has no task list: {}",
            preview
        )));
    }
    Ok((listed, String::new()))
}

fn numbered(items: impl Iterator<Item = String>, empty: &str) -> String {
    let lines: Vec<String> = items
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

impl BossPlanner {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            tool_description: TOOL_DESCRIPTION.to_string(),
            completed_window: None,
        }
    }

    pub fn with_tool_description(mut self, description: impl Into<String>) -> Self {
        self.tool_description = description.into();
        self
    }

    /// Only show the most recent `window` completed tasks in the prompt
    pub fn with_completed_window(mut self, window: Option<usize>) -> Self {
        self.completed_window = window;
        self
    }

    fn build_prompt(&self, input: &PlanningInput<'_>) -> String {
        let shown = input.completed.recent(self.completed_window);
        let mut completed_header = "COMPLETED TASKS:".to_string();
        if shown.len() < input.completed.len() {
            completed_header = format!(
                "COMPLETED TASKS (most recent {} of {}):",
                shown.len(),
                input.completed.len()
            );
        }

        format!(
            "OBJECTIVE: {}\n\n\
             TOOLS:\n{}\n\n\
             EXECUTIVE SUMMARY OF RESULTS SO FAR:\n{}\n\n\
             {}\n{}\n\n\
             CURRENT TASK LIST:\n{}\n\n\
             Return the complete updated task list as JSON.",
            input.objective,
            self.tool_description,
            input.executive_summary,
            completed_header,
            numbered(shown.iter().cloned(), "None"),
            numbered(input.queue.iter().map(|t| t.to_string()), "Empty"),
        )
    }

    /// Ask the model for the next task list.
    ///
    /// # Errors
    /// Provider failures and unparsable output both fail the cycle.
    pub async fn plan(&self, input: PlanningInput<'_>) -> Result<Plan, EngineError> {
        let prompt = self.build_prompt(&input);
        debug!(prompt_chars = prompt.len(), "Planner prompt built");

        let reply = self
            .llm
            .generate(&[Message::system(PLANNER_SYSTEM_PROMPT), Message::user(prompt)])
            .await?;

        let (tasks, thoughts) = parse_plan(&reply)?;
        info!(tasks = tasks.len(), "Planner produced task list");

        Ok(Plan { tasks, thoughts })
    }
}
