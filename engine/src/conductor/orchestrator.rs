//! Orchestrator
//!
//! Drives the plan → retrieve → execute → clean → store loop. One task is
//! completed per cycle and the task counter only advances when a record has
//! been persisted, so record ids `doc_id_1..=doc_id_N` are dense.

use crate::conductor::cleaner::ResultCleaner;
use crate::conductor::context::ContextAssembler;
use crate::conductor::planner::{BossPlanner, PlanningInput};
use crate::conductor::queue::{CompletedTasks, TaskQueue};
use crate::conductor::report::Reporter;
use crate::conductor::worker::Worker;
use crate::config::AgentConfig;
use crate::knowledge::{KnowledgeStore, RetrievalIndex, EMPTY_SUMMARY};
use crate::tools::CodeRunner;
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{record_id, KnowledgeMetadata, WorkerOutput};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Steps of one cycle, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    ContextRetrieval,
    Executing,
    CodeExecution,
    Cleaning,
    Embedding,
    Persisting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Planning => "planning",
            Phase::ContextRetrieval => "context_retrieval",
            Phase::Executing => "executing",
            Phase::CodeExecution => "code_execution",
            Phase::Cleaning => "cleaning",
            Phase::Embedding => "embedding",
            Phase::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The task counter passed `max_iterations`
    IterationCap,

    /// The planner returned an empty task list too many times in a row
    Idle,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::IterationCap => f.write_str("iteration cap reached"),
            StopReason::Idle => f.write_str("planner idle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub cycles_completed: u32,
    pub completed_tasks: Vec<String>,
    pub idle_cycles: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Completed,
    Idle,
}

/// Loop limits and pacing
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub objective: String,
    pub max_iterations: u32,
    pub cycle_delay: Duration,
    pub context_top_k: usize,
    pub max_idle_cycles: u32,
    pub max_cycle_retries: u32,
}

impl OrchestratorSettings {
    pub fn from_config(agent: &AgentConfig) -> Self {
        Self {
            objective: agent.objective.clone(),
            max_iterations: agent.max_iterations,
            cycle_delay: Duration::from_secs(agent.cycle_delay_secs),
            context_top_k: agent.context_top_k,
            max_idle_cycles: agent.max_idle_cycles.max(1),
            max_cycle_retries: agent.max_cycle_retries,
        }
    }
}

pub struct Orchestrator {
    settings: OrchestratorSettings,
    planner: BossPlanner,
    worker: Worker,
    cleaner: ResultCleaner,
    knowledge: Arc<KnowledgeStore>,
    context: ContextAssembler,
    retrieval: Arc<dyn RetrievalIndex>,
    code_runner: Option<Arc<dyn CodeRunner>>,
    reporter: Reporter,
    queue: TaskQueue,
    completed: CompletedTasks,
    counter: u32,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        planner: BossPlanner,
        worker: Worker,
        cleaner: ResultCleaner,
        knowledge: Arc<KnowledgeStore>,
        retrieval: Arc<dyn RetrievalIndex>,
        reporter: Reporter,
    ) -> Self {
        let context = ContextAssembler::new(knowledge.clone(), settings.context_top_k);
        Self {
            settings,
            planner,
            worker,
            cleaner,
            knowledge,
            context,
            retrieval,
            code_runner: None,
            reporter,
            queue: TaskQueue::new(),
            completed: CompletedTasks::new(),
            counter: 1,
        }
    }

    /// Runner for `Code` worker output. Without one, code output is fatal.
    pub fn with_code_runner(mut self, runner: Arc<dyn CodeRunner>) -> Self {
        self.code_runner = Some(runner);
        self
    }

    /// Id of the next record to be written (starts at 1)
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn completed(&self) -> &CompletedTasks {
        &self.completed
    }

    /// Run cycles until the counter passes `max_iterations` or the planner
    /// stays idle for `max_idle_cycles` cycles in a row.
    ///
    /// # Errors
    /// Returns the first fatal error, or a recoverable one that persisted
    /// through `max_cycle_retries` retries.
    pub async fn run(&mut self) -> Result<RunSummary, EngineError> {
        self.reporter.objective(&self.settings.objective);
        info!(
            objective = %self.settings.objective,
            max_iterations = self.settings.max_iterations,
            "Starting agent loop"
        );

        let mut consecutive_idle = 0u32;
        let mut idle_cycles = 0u32;
        let mut stop_reason = StopReason::IterationCap;

        while self.counter <= self.settings.max_iterations {
            match self.run_cycle_with_retries().await? {
                CycleOutcome::Completed => consecutive_idle = 0,
                CycleOutcome::Idle => {
                    consecutive_idle += 1;
                    idle_cycles += 1;
                    warn!(
                        consecutive_idle,
                        limit = self.settings.max_idle_cycles,
                        "Planner returned no tasks"
                    );
                    if consecutive_idle >= self.settings.max_idle_cycles {
                        stop_reason = StopReason::Idle;
                        break;
                    }
                }
            }

            if self.counter <= self.settings.max_iterations && !self.settings.cycle_delay.is_zero() {
                tokio::time::sleep(self.settings.cycle_delay).await;
            }
        }

        let summary = RunSummary {
            cycles_completed: self.counter - 1,
            completed_tasks: self.completed.as_slice().to_vec(),
            idle_cycles,
            stop_reason,
        };
        info!(
            cycles = summary.cycles_completed,
            idle_cycles,
            stop_reason = ?stop_reason,
            "Agent loop finished"
        );
        Ok(summary)
    }

    /// Retry a failed cycle from a clean state when the error is recoverable.
    async fn run_cycle_with_retries(&mut self) -> Result<CycleOutcome, EngineError> {
        let mut attempt = 0;
        loop {
            let saved_queue = self.queue.clone();
            let saved_completed = self.completed.len();

            match self.run_cycle().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_recoverable() && attempt < self.settings.max_cycle_retries => {
                    attempt += 1;
                    warn!(
                        cycle = self.counter,
                        attempt,
                        max_retries = self.settings.max_cycle_retries,
                        error = %e,
                        "Cycle failed, retrying"
                    );
                    self.queue = saved_queue;
                    self.completed.truncate(saved_completed);
                    if !self.settings.cycle_delay.is_zero() {
                        tokio::time::sleep(self.settings.cycle_delay).await;
                    }
                }
                Err(e) => {
                    warn!(cycle = self.counter, error = %e, hint = e.user_hint(), "Cycle failed");
                    return Err(e);
                }
            }
        }
    }

    fn enter(&self, phase: Phase) {
        debug!(cycle = self.counter, phase = %phase, "Entering phase");
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome, EngineError> {
        let objective = self.settings.objective.clone();
        let first_cycle = self.counter == 1;

        self.enter(Phase::Planning);
        let summary = if first_cycle {
            EMPTY_SUMMARY.to_string()
        } else {
            self.retrieval.summarize().await?
        };

        let plan = self
            .planner
            .plan(PlanningInput {
                objective: &objective,
                queue: &self.queue,
                executive_summary: &summary,
                completed: &self.completed,
            })
            .await?;
        self.queue.replace(plan.tasks);

        self.reporter.executive_summary(&summary);
        self.reporter.boss_thoughts(&plan.thoughts);

        if self.queue.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        self.reporter.task_list(&self.queue);
        let task = self.queue.pop_front()?;
        let task_text = task.to_string();

        let context = if first_cycle {
            String::new()
        } else {
            self.enter(Phase::ContextRetrieval);
            self.context.relevant_context(&task).await?
        };

        self.reporter.next_task(self.counter, &task);
        info!(cycle = self.counter, task = %task_text, "Executing task");

        self.enter(Phase::Executing);
        let output = self.worker.execute(&objective, &task, &context).await?;
        self.completed.push(task_text.clone());
        self.reporter.task_result(&output.display_text());

        let output = match output {
            WorkerOutput::Code(code) => {
                self.enter(Phase::CodeExecution);
                let runner = self
                    .code_runner
                    .as_ref()
                    .ok_or(EngineError::CodeExecutionDisabled)?;
                WorkerOutput::Text(runner.run(&code).await?)
            }
            other => other,
        };

        self.enter(Phase::Cleaning);
        let cleaned = match &output {
            WorkerOutput::Articles(articles) => self.cleaner.clean_articles(articles, &objective).await?,
            other => self.cleaner.clean(&other.display_text(), &objective).await?,
        };
        self.reporter.cleaned_result(&cleaned);

        self.enter(Phase::Embedding);
        let vector = self.knowledge.embed(&cleaned).await?;

        self.enter(Phase::Persisting);
        let id = record_id(self.counter);
        self.knowledge
            .insert(vector, id.clone(), KnowledgeMetadata::new(task_text, cleaned.clone()))
            .await?;
        self.retrieval.insert_text(&cleaned, &id).await?;

        info!(cycle = self.counter, id = %id, "Stored result");
        self.counter += 1;
        Ok(CycleOutcome::Completed)
    }
}
