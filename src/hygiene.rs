use std::{collections::HashMap, sync::Arc};

use teloxide::types::{ChatId, MessageId};
use tokio::sync::RwLock;

/// Последняя служебная подсказка бота в каждом чате.
/// Хранится максимум один id на чат; записи живут до рестарта процесса.
#[derive(Clone, Default)]
pub struct LastMessages {
    inner: Arc<RwLock<HashMap<ChatId, MessageId>>>,
}

impl LastMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<MessageId> {
        self.inner.read().await.get(&chat_id).copied()
    }

    pub async fn set(&self, chat_id: ChatId, message_id: MessageId) {
        self.inner.write().await.insert(chat_id, message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_only_the_most_recent_id_per_chat() {
        let tracker = LastMessages::new();
        let chat = ChatId(7);
        assert_eq!(tracker.get(chat).await, None);

        for id in 1..=5 {
            tracker.set(chat, MessageId(id)).await;
        }
        assert_eq!(tracker.get(chat).await, Some(MessageId(5)));
    }

    #[tokio::test]
    async fn chats_are_tracked_independently() {
        let tracker = LastMessages::new();
        tracker.set(ChatId(1), MessageId(10)).await;
        tracker.set(ChatId(2), MessageId(20)).await;

        assert_eq!(tracker.get(ChatId(1)).await, Some(MessageId(10)));
        assert_eq!(tracker.get(ChatId(2)).await, Some(MessageId(20)));
        assert_eq!(tracker.get(ChatId(3)).await, None);
    }
}
