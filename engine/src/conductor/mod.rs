//! Conductor System
//!
//! Plans tasks, executes them one per cycle, and feeds cleaned results back
//! into the knowledge stores.

pub mod cleaner;
pub mod context;
pub mod orchestrator;
pub mod planner;
pub mod queue;
pub mod report;
pub mod worker;

pub use cleaner::ResultCleaner;
pub use context::ContextAssembler;
pub use orchestrator::{Orchestrator, OrchestratorSettings, Phase, RunSummary, StopReason};
pub use planner::{BossPlanner, Plan, PlanningInput, TOOL_DESCRIPTION};
pub use queue::{CompletedTasks, TaskQueue};
pub use report::Reporter;
pub use worker::Worker;
