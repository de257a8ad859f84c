use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Video,
    Audio,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Прямая ссылка на ресурс. None, если VK её не отдал
    /// (типично для видео, размещённых на стене).
    pub url: Option<String>,
    pub title: Option<String>,
}

/// Пост стены в том виде, в котором его вернул источник.
/// Живёт только в рамках одного прохода.
#[derive(Debug, Clone)]
pub struct RawPost {
    pub source_id: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Цепочка репостов, внешний пост первым.
    pub copy_history: Vec<RawPost>,
    pub is_pinned: bool,
}

impl RawPost {
    /// Ссылка на оригинальную страницу поста.
    pub fn source_page_url(&self) -> String {
        format!("https://vk.com/wall{}_{}", self.owner_id, self.source_id)
    }
}

/// Каноническая идентичность поста: одинакова для оригинала и всех
/// его репостов, независимо от того, в каком сообществе пост всплыл.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub owner_id: i64,
    pub post_id: i64,
}

impl CanonicalKey {
    pub fn new(owner_id: i64, post_id: i64) -> Self {
        CanonicalKey { owner_id, post_id }
    }

    /// Разбирает ключ из формата хранения "{owner_id}_{post_id}".
    pub fn parse(raw: &str) -> Option<Self> {
        let (owner_id, post_id) = raw.rsplit_once('_')?;
        Some(CanonicalKey {
            owner_id: owner_id.parse().ok()?,
            post_id: post_id.parse().ok()?,
        })
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner_id, self.post_id)
    }
}

/// Запись об уже опубликованном посте. Единственная долговечная
/// сущность конвейера.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub published_at: DateTime<Utc>,
    pub message_ids: Vec<i64>,
}

/// Одна атомарная отправка в целевой канал: не более одного вложения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendUnit {
    pub text: Option<String>,
    /// None означает чисто текстовую отправку или ссылку-заглушку.
    pub attachment: Option<Attachment>,
    /// Всегда прикладывается к отправке как кнопка на оригинал.
    pub source_url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryReceipt {
    pub message_id: i64,
}

/// Пост, прошедший фильтры и готовый к планированию отправок.
#[derive(Debug, Clone)]
pub struct PublishablePost {
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// После фильтра по типам контента не осталось ни вложений, ни текста.
    NoEligibleContent,
    /// Текст поста содержит стоп-слово.
    BlockedKeyword(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoEligibleContent => write!(f, "no eligible content"),
            RejectReason::BlockedKeyword(keyword) => write!(f, "blocked keyword '{}'", keyword),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PolicyDecision {
    Allowed(PublishablePost),
    Rejected(RejectReason),
}
