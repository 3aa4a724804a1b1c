//! Scripted provider for offline runs and tests
//!
//! The responder closure sees the full conversation and decides the reply,
//! so a single mock can play planner, worker and cleaner by inspecting the
//! system prompt.

use super::{LLMError, LLMProvider, Message};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&[Message]) -> Result<String, LLMError> + Send + Sync;

#[derive(Clone)]
pub struct MockProvider {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String, LLMError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that always answers with the same text
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Every conversation the provider has been asked to complete, in order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        (self.responder)(messages)
    }
}
