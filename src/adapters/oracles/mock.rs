//! Mock complexity oracle for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ComplexityOracle;

/// Scripted oracle reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    /// Reply text
    pub output: String,
    /// Whether to simulate an unreachable oracle
    pub fail: bool,
    /// Error message if failing
    pub error_message: Option<String>,
    /// Never reply; the caller's timeout must fire
    pub hang: bool,
    /// Delay before replying
    pub delay: Option<Duration>,
}

impl Default for MockReply {
    fn default() -> Self {
        Self {
            output: "{}".to_string(),
            fail: false,
            error_message: None,
            hang: false,
            delay: None,
        }
    }
}

impl MockReply {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            fail: true,
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Rule {
    pattern: String,
    reply: MockReply,
}

/// Oracle returning scripted replies.
///
/// Replies are chosen in this order: the first rule whose pattern occurs in
/// the prompt, then the next queued reply, then the default reply. Every
/// prompt is recorded.
pub struct MockOracle {
    rules: Vec<Rule>,
    queue: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    prompts: Mutex<Vec<String>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::with_default_reply(MockReply::failure("no scripted reply"))
    }

    pub fn with_default_reply(reply: MockReply) -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default_reply: reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for the next unmatched call.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.queue.lock().push_back(reply);
        self
    }

    /// Reply with `reply` to every prompt containing `pattern`.
    pub fn with_rule(mut self, pattern: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply,
        });
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some(rule) = self.rules.iter().find(|rule| prompt.contains(&rule.pattern)) {
            return rule.reply.clone();
        }
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComplexityOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> DomainResult<String> {
        self.prompts.lock().push(prompt.to_string());
        let reply = self.next_reply(prompt);

        if reply.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        if reply.fail {
            return Err(DomainError::OracleUnavailable(
                reply.error_message.unwrap_or_else(|| "Mock failure".to_string()),
            ));
        }
        Ok(reply.output)
    }
}
