use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use ai_client::OpenAi;
use hypeflow_common::HypeflowError;

/// The structured-extraction backend seam.
///
/// Everything the core asks of the LLM goes through this one call:
/// system instructions plus content in, raw text out. Live traffic uses
/// `OpenAiBackend`; tests use the scripted `MockBackend`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn request(&self, system: &str, content: &str) -> Result<String>;
}

/// Live backend wrapping the OpenAI chat client, with a per-call timeout.
/// A timed-out call is indistinguishable from an unreachable backend to
/// callers, which treat both as "no result this time".
pub struct OpenAiBackend {
    agent: OpenAi,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(agent: OpenAi, timeout: Duration) -> Self {
        Self { agent, timeout }
    }

    pub fn from_env(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(OpenAi::from_env(model)?, timeout))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn request(&self, system: &str, content: &str) -> Result<String> {
        debug!(model = self.agent.model(), "Completion request");

        match tokio::time::timeout(self.timeout, self.agent.chat_completion(system, content))
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(HypeflowError::BackendUnavailable(e.to_string()).into()),
            Err(_) => Err(HypeflowError::BackendUnavailable(format!(
                "timed out after {:?}",
                self.timeout
            ))
            .into()),
        }
    }
}
