use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::models::AttachmentKind;

#[derive(Parser, Debug, Clone)]
#[command(name = "wallposter")]
#[command(version = "0.3.0")]
#[command(about = "VK to Telegram channel cross-poster")]
pub struct Config {
    /// Сервисный токен VK API
    /// env: VK_API_TOKEN
    #[arg(long, env = "VK_API_TOKEN")]
    pub vk_token: String,

    /// Версия VK API
    /// env: WP_VK_API_VERSION
    #[arg(long, env = "WP_VK_API_VERSION", default_value = "5.199")]
    pub vk_api_version: String,

    /// Токен Telegram бота
    /// env: TELEGRAM_BOT_TOKEN
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    pub tg_token: String,

    /// Целевой канал (@channel или числовой id)
    /// env: TELEGRAM_CHANNEL_ID
    #[arg(long, env = "TELEGRAM_CHANNEL_ID")]
    pub tg_channel: String,

    /// Путь к JSON-файлу политики синхронизации
    /// env: WP_POLICY_FILE
    #[arg(long, env = "WP_POLICY_FILE", default_value = "config/policy.json")]
    pub policy_file: String,

    /// Путь к файлу кэша опубликованных постов
    /// env: WP_CACHE_FILE
    #[arg(long, env = "WP_CACHE_FILE", default_value = "data/cache.json")]
    pub cache_file: String,

    /// Интервал между проходами в секундах
    /// env: WP_INTERVAL_SECS
    #[arg(long, env = "WP_INTERVAL_SECS", default_value = "600")]
    pub interval_secs: u64,

    /// Число немедленных повторов отправки при временной ошибке
    /// env: WP_SEND_RETRIES
    #[arg(long, env = "WP_SEND_RETRIES", default_value = "2")]
    pub send_retries: u32,

    /// Выполнить один проход и выйти
    #[arg(long, env = "WP_ONCE")]
    pub once: bool,
}

impl Config {
    /// Валидирует конфигурацию при запуске
    pub fn validate(&self) -> AppResult<()> {
        if self.vk_token.trim().is_empty() {
            return Err("VK token is empty. Set VK_API_TOKEN or pass --vk-token".into());
        }

        if self.tg_token.trim().is_empty() {
            return Err("Telegram token is empty. Set TELEGRAM_BOT_TOKEN or pass --tg-token".into());
        }

        if self.tg_channel.trim().is_empty() {
            return Err(
                "Telegram channel is empty. Set TELEGRAM_CHANNEL_ID or pass --tg-channel".into(),
            );
        }

        if !self.once && self.interval_secs == 0 {
            return Err("Interval must be positive unless --once is set".into());
        }

        Ok(())
    }
}

/// Политика синхронизации: какие сообщества зеркалировать и что
/// отфильтровывать. Загружается один раз на старте процесса; каждый
/// проход работает с неизменным снимком.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncPolicy {
    #[serde(default = "default_posts_limit")]
    pub posts_limit: u32,

    /// Глобальный список стоп-слов (регистронезависимое вхождение).
    #[serde(default)]
    pub blocked_keywords: Vec<String>,

    pub communities: Vec<Community>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Community {
    /// owner_id стены; для сообществ VK он отрицательный.
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub content_types: ContentTypes,
}

/// Разрешённые типы контента для одного сообщества.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ContentTypes {
    pub text: bool,
    pub photo: bool,
    pub video: bool,
    pub audio: bool,
    pub link: bool,
}

impl Default for ContentTypes {
    fn default() -> Self {
        ContentTypes {
            text: true,
            photo: true,
            video: true,
            audio: true,
            link: true,
        }
    }
}

impl ContentTypes {
    pub fn allows(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Photo => self.photo,
            AttachmentKind::Video => self.video,
            AttachmentKind::Audio => self.audio,
            AttachmentKind::Link => self.link,
        }
    }
}

fn default_posts_limit() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

pub fn load_policy(path: &Path) -> AppResult<SyncPolicy> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Cannot read policy file {}: {}", path.display(), e)))?;

    let policy: SyncPolicy = serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("Invalid policy file {}: {}", path.display(), e)))?;

    if policy.communities.is_empty() {
        return Err(AppError::Config(
            "Policy must define at least one community".to_string(),
        ));
    }

    Ok(policy)
}
