//! Bridges the notifier's refresh prompt to a line-oriented front end

use async_trait::async_trait;
use teller_core::{PromptDue, RefreshDecision, RefreshPrompt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const REQUEST_BUFFER: usize = 4;

/// A pending "refresh now?" question
#[derive(Debug)]
pub struct PromptRequest {
    pub due: PromptDue,
    reply: oneshot::Sender<RefreshDecision>,
}

impl PromptRequest {
    /// Answer the question; the notifier task resumes with `decision`
    pub fn answer(self, decision: RefreshDecision) {
        if self.reply.send(decision).is_err() {
            debug!(identity = %self.due.key, "Prompt answered after the notifier gave up");
        }
    }
}

/// [`RefreshPrompt`] that forwards each question over a channel
///
/// A dropped receiver or an unanswered request counts as
/// [`RefreshDecision::LetExpire`].
#[derive(Clone)]
pub struct ChannelPrompt {
    requests: mpsc::Sender<PromptRequest>,
}

impl ChannelPrompt {
    pub fn new() -> (Self, mpsc::Receiver<PromptRequest>) {
        let (requests, receiver) = mpsc::channel(REQUEST_BUFFER);
        (Self { requests }, receiver)
    }
}

#[async_trait]
impl RefreshPrompt for ChannelPrompt {
    async fn prompt(&self, due: &PromptDue) -> RefreshDecision {
        let (reply, answer) = oneshot::channel();
        let request = PromptRequest {
            due: due.clone(),
            reply,
        };
        if self.requests.send(request).await.is_err() {
            return RefreshDecision::LetExpire;
        }
        answer.await.unwrap_or(RefreshDecision::LetExpire)
    }
}

/// Read a yes/no answer; anything else is `None`
pub fn parse_decision(line: &str) -> Option<RefreshDecision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(RefreshDecision::RefreshNow),
        "n" | "no" => Some(RefreshDecision::LetExpire),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn due() -> PromptDue {
        PromptDue {
            key: "ada@example.com".into(),
            email: "ada@example.com".into(),
            expires_at: 1_000,
        }
    }

    #[tokio::test]
    async fn answer_reaches_the_prompt() {
        let (prompt, mut requests) = ChannelPrompt::new();
        let asking = tokio::spawn(async move { prompt.prompt(&due()).await });

        let request = requests.recv().await.unwrap();
        assert_eq!(request.due.key, "ada@example.com");
        request.answer(RefreshDecision::RefreshNow);

        assert_eq!(asking.await.unwrap(), RefreshDecision::RefreshNow);
    }

    #[tokio::test]
    async fn unanswered_prompt_lets_token_expire() {
        let (prompt, requests) = ChannelPrompt::new();
        drop(requests);
        assert_eq!(prompt.prompt(&due()).await, RefreshDecision::LetExpire);

        let (prompt, mut requests) = ChannelPrompt::new();
        let asking = tokio::spawn(async move { prompt.prompt(&due()).await });
        drop(requests.recv().await.unwrap());
        assert_eq!(asking.await.unwrap(), RefreshDecision::LetExpire);
    }

    #[test]
    fn parses_yes_and_no() {
        assert_eq!(parse_decision(" Y "), Some(RefreshDecision::RefreshNow));
        assert_eq!(parse_decision("no"), Some(RefreshDecision::LetExpire));
        assert_eq!(parse_decision("maybe"), None);
    }
}
