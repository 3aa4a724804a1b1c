//! Console sections
//!
//! Human-readable progress on stdout, one colored section per step of the
//! cycle. Purely observational; tests and `--quiet` silence it.

use crate::conductor::queue::TaskQueue;
use crate::secrets::{SecretCache, SecretManager};
use colored::{Color, Colorize};
use sdk::types::Task;

#[derive(Clone, Default)]
pub struct Reporter {
    quiet: bool,
    secrets: Option<SecretCache>,
}

/// Header line for a section, e.g. `*****TASK LIST*****`
pub fn section_header(title: &str) -> String {
    format!("*****{}*****", title)
}

impl Reporter {
    pub fn new(secrets: Option<SecretCache>) -> Self {
        Self {
            quiet: false,
            secrets,
        }
    }

    /// A reporter that prints nothing
    pub fn silent() -> Self {
        Self {
            quiet: true,
            secrets: None,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn scrub(&self, text: &str) -> String {
        match &self.secrets {
            Some(cache) => cache.scrub(text),
            None => SecretManager::scrub(text),
        }
    }

    fn section(&self, title: &str, color: Color, body: &str) {
        if self.quiet {
            return;
        }
        println!("{}", format!("\n{}\n", section_header(title)).color(color).bold());
        println!("{}", self.scrub(body).color(color));
    }

    pub fn objective(&self, objective: &str) {
        self.section("OBJECTIVE", Color::Cyan, objective);
    }

    pub fn executive_summary(&self, summary: &str) {
        self.section("EXECUTIVE SUMMARY", Color::Red, summary);
    }

    pub fn boss_thoughts(&self, thoughts: &str) {
        self.section("BOSS THOUGHTS", Color::Red, thoughts);
    }

    pub fn task_list(&self, queue: &TaskQueue) {
        let listing = queue
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.section("TASK LIST", Color::White, &listing);
    }

    pub fn next_task(&self, task_id: u32, task: &Task) {
        self.section(
            "NEXT TASK",
            Color::Red,
            &format!("task id: {} task: {}", task_id, task),
        );
    }

    pub fn task_result(&self, result: &str) {
        self.section("TASK RESULT", Color::Green, result);
    }

    pub fn cleaned_result(&self, cleaned: &str) {
        self.section("CLEANED RESULT", Color::Blue, cleaned);
    }
}
