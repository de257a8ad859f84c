//! Оркестратор одного прохода синхронизации.
//!
//! Для каждого активного сообщества: fetch -> resolve -> dedup-check ->
//! filter -> plan -> dispatch -> commit. Единица изоляции ошибок - одно
//! сообщество или один пост, проход целиком не прерывается никогда.
//!
//! Гарантия доставки - at-least-once: пост фиксируется в хранилище
//! только после успеха всех его отправок, поэтому прерванный на середине
//! пост будет повторён следующим проходом целиком (возможны дубли
//! отдельных вложений после аварии, потеря поста невозможна).

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::api::{DestinationApi, SourceApi};
use crate::canonical;
use crate::config::{Community, SyncPolicy};
use crate::dedup::DedupStore;
use crate::error::DeliveryError;
use crate::models::{DedupRecord, DeliveryReceipt, PolicyDecision, RawPost, SendUnit};
use crate::{planner, policy};

/// Итог обработки одного поста.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostOutcome {
    /// Канонический ключ уже в хранилище.
    Duplicate,
    /// Отклонён политикой контента.
    Rejected,
    /// Все отправки доставлены, ключ зафиксирован.
    Committed,
    /// Доставка сорвалась; пост не зафиксирован и будет повторён.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub published: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub failed_posts: usize,
    pub failed_communities: usize,
}

pub struct SyncOrchestrator<'a> {
    source: &'a dyn SourceApi,
    destination: &'a dyn DestinationApi,
    store: &'a mut dyn DedupStore,
    policy: &'a SyncPolicy,
    send_retries: u32,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        source: &'a dyn SourceApi,
        destination: &'a dyn DestinationApi,
        store: &'a mut dyn DedupStore,
        policy: &'a SyncPolicy,
        send_retries: u32,
    ) -> Self {
        SyncOrchestrator {
            source,
            destination,
            store,
            policy,
            send_retries,
        }
    }

    /// Один проход по всем сообществам в порядке конфигурации.
    pub async fn run(&mut self) -> RunStats {
        let mut stats = RunStats::default();
        let policy = self.policy;

        for community in &policy.communities {
            if !community.active {
                debug!("Community {} is disabled, skipping", community.name);
                continue;
            }

            let posts = match self
                .source
                .fetch_recent_posts(community.id, policy.posts_limit)
                .await
            {
                Ok(posts) => posts,
                Err(e) => {
                    // Ошибка одного сообщества не прерывает проход
                    warn!("Failed to fetch posts for {}: {}", community.name, e);
                    stats.failed_communities += 1;
                    continue;
                }
            };

            info!("Fetched {} posts from {}", posts.len(), community.name);
            stats.fetched += posts.len();
            self.process_batch(community, posts, &mut stats).await;
        }

        info!(
            "Run finished: {} published, {} duplicates, {} rejected, {} failed posts, {} failed communities",
            stats.published,
            stats.duplicates,
            stats.rejected,
            stats.failed_posts,
            stats.failed_communities
        );
        stats
    }

    async fn process_batch(
        &mut self,
        community: &Community,
        mut posts: Vec<RawPost>,
        stats: &mut RunStats,
    ) {
        // Публикуем в хронологическом порядке. Закреплённый пост приходит
        // первым в выдаче, но сортируется по своей реальной дате.
        posts.sort_by_key(|post| post.created_at);

        for post in posts {
            match self.process_post(community, &post).await {
                PostOutcome::Duplicate => stats.duplicates += 1,
                PostOutcome::Rejected => stats.rejected += 1,
                PostOutcome::Committed => stats.published += 1,
                PostOutcome::Failed => stats.failed_posts += 1,
            }
        }
    }

    async fn process_post(&mut self, community: &Community, post: &RawPost) -> PostOutcome {
        let key = canonical::resolve(post);

        if self.store.contains(&key) {
            // Закреплённые посты попадают сюда на каждом проходе
            let marker = if post.is_pinned { " (pinned)" } else { "" };
            debug!(
                "Post {}{} from {} already published as {}",
                post.source_id, marker, community.name, key
            );
            return PostOutcome::Duplicate;
        }

        let publishable = match policy::accepts(post, community, &self.policy.blocked_keywords) {
            PolicyDecision::Allowed(publishable) => publishable,
            PolicyDecision::Rejected(reason) => {
                // Решение политики, а не ошибка
                info!(
                    "Post {} from {} rejected: {}",
                    post.source_id, community.name, reason
                );
                return PostOutcome::Rejected;
            }
        };

        let units = planner::plan(&publishable, &post.source_page_url());

        let message_ids = match self.dispatch_units(&units).await {
            Ok(message_ids) => message_ids,
            Err(e) => {
                warn!(
                    "Failed to publish post {} from {}: {}",
                    post.source_id, community.name, e
                );
                return PostOutcome::Failed;
            }
        };

        let record = DedupRecord {
            published_at: Utc::now(),
            message_ids,
        };
        if let Err(e) = self.store.commit(key, record) {
            error!("Failed to commit post {}: {}", key, e);
            return PostOutcome::Failed;
        }
        if let Err(e) = self.store.flush() {
            // Пост доставлен; несохранённая запись означает лишь возможный
            // повтор после перезапуска
            error!("Failed to flush dedup store: {}", e);
        }

        info!(
            "Published post {} from {} ({} units)",
            post.source_id,
            community.name,
            units.len()
        );
        PostOutcome::Committed
    }

    /// Отправляет все единицы поста по порядку. Первая неустранимая
    /// ошибка останавливает пост целиком: оставшиеся единицы не
    /// отправляются, чтобы не опубликовать пост с дырами.
    async fn dispatch_units(&self, units: &[SendUnit]) -> Result<Vec<i64>, DeliveryError> {
        let mut message_ids = Vec::with_capacity(units.len());
        for unit in units {
            let receipt = self.dispatch_with_retry(unit).await?;
            message_ids.push(receipt.message_id);
        }
        Ok(message_ids)
    }

    async fn dispatch_with_retry(&self, unit: &SendUnit) -> Result<DeliveryReceipt, DeliveryError> {
        let mut attempt = 0;
        loop {
            match self.destination.send(unit).await {
                Ok(receipt) => return Ok(receipt),
                Err(DeliveryError::Transient(reason)) if attempt < self.send_retries => {
                    attempt += 1;
                    debug!(
                        "Transient delivery error, retrying ({}/{}): {}",
                        attempt, self.send_retries, reason
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
