use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PilotError, PilotResult};

/// A user's response to a clarifying question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReply {
    Answer(String),
    /// Stop the run
    Exit,
}

/// Where clarifying questions go. The pilot suspends until `ask` returns.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    async fn ask(&self, question: &str) -> PilotResult<UserReply>;
}

/// Replays canned replies in order, then answers [`UserReply::Exit`].
///
/// Suits unattended runs and tests.
#[derive(Default)]
pub struct ScriptedInteraction {
    replies: Mutex<VecDeque<UserReply>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new(replies: impl IntoIterator<Item = UserReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Never answers; every question ends the run
    pub fn unattended() -> Self {
        Self::default()
    }

    /// Questions received so far
    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UserInteraction for ScriptedInteraction {
    async fn ask(&self, question: &str) -> PilotResult<UserReply> {
        self.asked
            .lock()
            .map_err(|_| PilotError::Aborted("interaction lock poisoned".into()))?
            .push(question.to_string());
        let reply = self
            .replies
            .lock()
            .map_err(|_| PilotError::Aborted("interaction lock poisoned".into()))?
            .pop_front();
        Ok(reply.unwrap_or(UserReply::Exit))
    }
}
