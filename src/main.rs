use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod canonical;
mod config;
mod dedup;
mod error;
mod models;
mod pipeline;
mod planner;
mod policy;

use api::telegram::TelegramClient;
use api::vk::VkClient;
use config::Config;
use dedup::JsonDedupStore;
use error::AppResult;
use pipeline::SyncOrchestrator;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Инициализируем логирование
    init_tracing()?;

    // Парсим конфигурацию из CLI и env
    let config = Config::parse();

    // Валидируем конфигурацию
    config.validate()?;

    // Политика загружается один раз; каждый проход работает со снимком
    let policy = config::load_policy(Path::new(&config.policy_file))?;

    info!(
        "Starting wallposter - {} communities, channel {}, cache {}",
        policy.communities.len(),
        config.tg_channel,
        config.cache_file
    );

    let (mut store, corruption) = JsonDedupStore::open(&config.cache_file);
    if let Some(e) = corruption {
        // Пустое хранилище вместо падения; возможен повтор старых постов
        warn!("Dedup cache unreadable, starting empty: {}", e);
    } else if !store.is_empty() {
        info!("Dedup cache loaded: {} published posts", store.len());
    }

    let vk_client = VkClient::new(&config.vk_token, &config.vk_api_version);
    let tg_client = TelegramClient::new(&config.tg_token, &config.tg_channel);

    if config.once {
        SyncOrchestrator::new(&vk_client, &tg_client, &mut store, &policy, config.send_retries)
            .run()
            .await;
        return Ok(());
    }

    // Последовательный цикл: проходы не перекрываются по построению
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs));
    loop {
        ticker.tick().await;
        SyncOrchestrator::new(&vk_client, &tg_client, &mut store, &policy, config.send_retries)
            .run()
            .await;
    }
}

/// Инициализирует систему логирования с использованием tracing
fn init_tracing() -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    Ok(())
}
