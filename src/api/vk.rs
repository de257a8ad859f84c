use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::models::{Attachment, AttachmentKind, RawPost};

const VK_API_URL: &str = "https://api.vk.com/method";
const USER_AGENT: &str = "wallposter/0.3";
const TIMEOUT_SECS: u64 = 15;

pub struct VkClient {
    http_client: Client,
    token: String,
    api_version: String,
}

impl VkClient {
    pub fn new(token: &str, api_version: &str) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        VkClient {
            http_client,
            token: token.to_string(),
            api_version: api_version.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl super::SourceApi for VkClient {
    async fn fetch_recent_posts(&self, community_id: i64, limit: u32) -> AppResult<Vec<RawPost>> {
        debug!("Requesting wall.get for owner_id={}", community_id);

        let response = self
            .http_client
            .get(format!("{}/wall.get", VK_API_URL))
            .query(&[
                ("owner_id", community_id.to_string()),
                ("count", limit.to_string()),
                ("access_token", self.token.clone()),
                ("v", self.api_version.clone()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("wall.get request failed: {}", e);
                AppError::SourceUnavailable(format!("wall.get: {}", e))
            })?;

        if !response.status().is_success() {
            error!("wall.get returned HTTP {}", response.status());
            return Err(AppError::SourceUnavailable(format!(
                "wall.get: HTTP {}",
                response.status()
            )));
        }

        let payload: VkResponse<WallGetResponse> = response.json().await?;

        if let Some(api_error) = payload.error {
            error!(
                "VK API error {} for owner_id={}: {}",
                api_error.error_code, community_id, api_error.error_msg
            );
            return Err(AppError::SourceUnavailable(format!(
                "VK API error {}: {}",
                api_error.error_code, api_error.error_msg
            )));
        }

        let items = payload.response.map(|r| r.items).unwrap_or_default();
        debug!("wall.get returned {} items", items.len());

        Ok(items.into_iter().map(convert_post).collect())
    }
}

fn convert_post(item: VkPost) -> RawPost {
    let created_at = DateTime::<Utc>::from_timestamp(item.date, 0).unwrap_or_else(Utc::now);

    RawPost {
        source_id: item.id,
        owner_id: item.owner_id,
        created_at,
        text: item.text,
        attachments: item
            .attachments
            .into_iter()
            .filter_map(convert_attachment)
            .collect(),
        copy_history: item.copy_history.into_iter().map(convert_post).collect(),
        is_pinned: item.is_pinned != 0,
    }
}

/// Неизвестные типы вложений (документы, опросы и т.п.) отбрасываются.
fn convert_attachment(raw: VkAttachment) -> Option<Attachment> {
    match raw.kind.as_str() {
        "photo" => {
            let photo = raw.photo?;
            // Берём максимальное разрешение
            let best = photo
                .sizes
                .into_iter()
                .max_by_key(|size| u64::from(size.width) * u64::from(size.height))?;
            Some(Attachment {
                kind: AttachmentKind::Photo,
                url: Some(best.url),
                title: None,
            })
        }
        "video" => {
            let video = raw.video?;
            // player обычно указывает на embed-страницу, а не на файл;
            // целевой API такую ссылку как медиа не примет. Payload
            // оставляем только для прямых видеофайлов, иначе сработает
            // запасной вариант со ссылкой на пост.
            Some(Attachment {
                kind: AttachmentKind::Video,
                url: video.player.filter(|url| is_direct_video_file(url)),
                title: video.title.filter(|title| !title.is_empty()),
            })
        }
        "audio" => {
            let audio = raw.audio?;
            let title = match (audio.artist.as_deref(), audio.title.as_deref()) {
                (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
                (Some(artist), None) => Some(artist.to_string()),
                (None, Some(title)) => Some(title.to_string()),
                (None, None) => None,
            };
            Some(Attachment {
                kind: AttachmentKind::Audio,
                url: audio.url.filter(|url| !url.is_empty()),
                title,
            })
        }
        "link" => {
            let link = raw.link?;
            Some(Attachment {
                kind: AttachmentKind::Link,
                url: Some(link.url),
                title: link.title.filter(|title| !title.is_empty()),
            })
        }
        _ => None,
    }
}

/// Прямой видеофайл, который можно загрузить как медиа.
fn is_direct_video_file(url: &str) -> bool {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    path.ends_with(".mp4") || path.ends_with(".mov") || path.ends_with(".mkv")
}

#[derive(Debug, Deserialize)]
struct VkResponse<T> {
    response: Option<T>,
    error: Option<VkApiError>,
}

#[derive(Debug, Deserialize)]
struct VkApiError {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct WallGetResponse {
    items: Vec<VkPost>,
}

#[derive(Debug, Deserialize)]
struct VkPost {
    id: i64,
    owner_id: i64,
    date: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachments: Vec<VkAttachment>,
    #[serde(default)]
    copy_history: Vec<VkPost>,
    #[serde(default)]
    is_pinned: u8,
}

#[derive(Debug, Deserialize)]
struct VkAttachment {
    #[serde(rename = "type")]
    kind: String,
    photo: Option<VkPhoto>,
    video: Option<VkVideo>,
    audio: Option<VkAudio>,
    link: Option<VkLink>,
}

#[derive(Debug, Deserialize)]
struct VkPhoto {
    #[serde(default)]
    sizes: Vec<VkPhotoSize>,
}

#[derive(Debug, Deserialize)]
struct VkPhotoSize {
    url: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct VkVideo {
    player: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VkAudio {
    url: Option<String>,
    artist: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VkLink {
    url: String,
    title: Option<String>,
}
