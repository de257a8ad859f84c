pub mod telegram;
pub mod vk;

use async_trait::async_trait;

use crate::error::{AppResult, DeliveryError};
use crate::models::{DeliveryReceipt, RawPost, SendUnit};

/// Источник постов, только чтение.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Возвращает последние посты стены сообщества, новые первыми.
    /// Ошибка означает "пропустить это сообщество в текущем проходе".
    async fn fetch_recent_posts(&self, community_id: i64, limit: u32) -> AppResult<Vec<RawPost>>;
}

/// Целевой канал доставки.
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// Отправляет одну единицу. Ошибка классифицирована как Transient
    /// (можно повторить сразу) или Permanent (пост бросается до
    /// следующего прохода).
    async fn send(&self, unit: &SendUnit) -> Result<DeliveryReceipt, DeliveryError>;
}
