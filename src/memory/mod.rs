//! Message history a pilot keeps across runs in the same workspace.

#[cfg(feature = "native")]
mod jsonl;

#[cfg(feature = "native")]
pub use jsonl::FileMessageHistory;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PilotResult;
use crate::types::Message;

/// Append-only message history
#[async_trait]
pub trait Memory: Send + Sync {
    /// Every stored message, oldest first
    async fn load(&self) -> PilotResult<Vec<Message>>;

    async fn append(&self, message: &Message) -> PilotResult<()>;
}

/// Volatile history, lost when dropped
#[derive(Default)]
pub struct InMemoryHistory {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl Memory for InMemoryHistory {
    async fn load(&self) -> PilotResult<Vec<Message>> {
        Ok(self.messages.read().await.clone())
    }

    async fn append(&self, message: &Message) -> PilotResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_keeps_order() {
        let memory = InMemoryHistory::new();
        assert!(memory.is_empty().await);
        memory.append(&Message::user("first")).await.unwrap();
        memory.append(&Message::assistant("second")).await.unwrap();

        let loaded = memory.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "first");
        assert_eq!(loaded[1].content, "second");
    }

    #[test]
    fn memory_is_object_safe() {
        fn _assert_object_safe(_: &dyn Memory) {}
    }
}
