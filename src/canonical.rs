//! Каноническая идентичность поста.
//!
//! Один и тот же пост может всплыть в нескольких сообществах как цепочка
//! репостов. Чтобы дедупликация работала между сообществами без общей
//! базы, ключ вычисляется чистой функцией от структуры поста: спускаемся
//! к самому глубокому (старому) звену copy_history и ключуем его.

use crate::models::{CanonicalKey, RawPost};

/// Предел обхода copy_history. Легитимные цепочки репостов короткие;
/// всё глубже считается повреждёнными данными.
const MAX_COPY_DEPTH: usize = 16;

/// Возвращает канонический ключ поста. Чистая функция, без I/O и без
/// ошибок: повреждённая цепочка приводит к ключу самого поста.
pub fn resolve(post: &RawPost) -> CanonicalKey {
    let mut current = post;
    let mut depth = 0usize;

    while let Some(next) = current.copy_history.last() {
        depth += 1;
        if depth > MAX_COPY_DEPTH {
            return CanonicalKey::new(post.owner_id, post.source_id);
        }
        current = next;
    }

    CanonicalKey::new(current.owner_id, current.source_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(owner_id: i64, source_id: i64) -> RawPost {
        RawPost {
            source_id,
            owner_id,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            text: String::new(),
            attachments: Vec::new(),
            copy_history: Vec::new(),
            is_pinned: false,
        }
    }

    fn repost_chain(depth: usize) -> RawPost {
        let mut current = post(-1, 0);
        for step in 1..=depth {
            let mut outer = post(-100 - step as i64, step as i64);
            outer.copy_history = vec![current];
            current = outer;
        }
        current
    }

    #[test]
    fn test_original_post_keys_on_itself() {
        let key = resolve(&post(-5, 77));
        assert_eq!(key, CanonicalKey::new(-5, 77));
    }

    #[test]
    fn test_repost_keys_on_deepest_entry() {
        let reposted = repost_chain(3);
        assert_eq!(resolve(&reposted), CanonicalKey::new(-1, 0));
    }

    #[test]
    fn test_repost_and_original_share_key() {
        let original = post(-1, 0);
        let reposted = repost_chain(1);
        assert_eq!(resolve(&original), resolve(&reposted));
    }

    #[test]
    fn test_excessive_depth_falls_back_to_own_key() {
        let reposted = repost_chain(MAX_COPY_DEPTH + 1);
        let expected = CanonicalKey::new(reposted.owner_id, reposted.source_id);
        assert_eq!(resolve(&reposted), expected);
    }

    #[test]
    fn test_depth_limit_is_inclusive() {
        let reposted = repost_chain(MAX_COPY_DEPTH);
        assert_eq!(resolve(&reposted), CanonicalKey::new(-1, 0));
    }
}
