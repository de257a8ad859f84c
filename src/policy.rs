//! Фильтры контента: допуск по типам вложений и глобальные стоп-слова.

use crate::config::Community;
use crate::models::{PolicyDecision, PublishablePost, RawPost, RejectReason};

/// Чистая функция решения: пропустить пост (с отфильтрованными
/// вложениями) или отклонить с причиной. Стоп-слово отклоняет пост
/// целиком, даже если вложения сами по себе допустимы.
pub fn accepts(post: &RawPost, community: &Community, blocked_keywords: &[String]) -> PolicyDecision {
    let allowed = &community.content_types;

    let attachments: Vec<_> = post
        .attachments
        .iter()
        .filter(|attachment| allowed.allows(attachment.kind))
        .cloned()
        .collect();

    let text = post.text.trim();
    let usable_text = allowed.text && !text.is_empty();

    if attachments.is_empty() && !usable_text {
        return PolicyDecision::Rejected(RejectReason::NoEligibleContent);
    }

    let lowered = post.text.to_lowercase();
    for keyword in blocked_keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        if lowered.contains(&keyword.to_lowercase()) {
            return PolicyDecision::Rejected(RejectReason::BlockedKeyword(keyword.to_string()));
        }
    }

    PolicyDecision::Allowed(PublishablePost {
        text: usable_text.then(|| text.to_string()),
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentTypes;
    use crate::models::{Attachment, AttachmentKind};
    use chrono::{TimeZone, Utc};

    fn community(content_types: ContentTypes) -> Community {
        Community {
            id: -1,
            name: "club1".to_string(),
            active: true,
            content_types,
        }
    }

    fn post(text: &str, attachments: Vec<Attachment>) -> RawPost {
        RawPost {
            source_id: 10,
            owner_id: -1,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            text: text.to_string(),
            attachments,
            copy_history: Vec::new(),
            is_pinned: false,
        }
    }

    fn attachment(kind: AttachmentKind) -> Attachment {
        Attachment {
            kind,
            url: Some("https://example.com/file".to_string()),
            title: None,
        }
    }

    #[test]
    fn test_disallowed_kinds_are_dropped() {
        let types = ContentTypes {
            video: false,
            audio: false,
            ..ContentTypes::default()
        };
        let post = post(
            "hello",
            vec![
                attachment(AttachmentKind::Photo),
                attachment(AttachmentKind::Video),
                attachment(AttachmentKind::Audio),
            ],
        );

        match accepts(&post, &community(types), &[]) {
            PolicyDecision::Allowed(publishable) => {
                assert_eq!(publishable.attachments.len(), 1);
                assert_eq!(publishable.attachments[0].kind, AttachmentKind::Photo);
            }
            PolicyDecision::Rejected(reason) => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_no_eligible_content_rejected() {
        let types = ContentTypes {
            photo: false,
            ..ContentTypes::default()
        };
        let post = post("   ", vec![attachment(AttachmentKind::Photo)]);

        match accepts(&post, &community(types), &[]) {
            PolicyDecision::Rejected(RejectReason::NoEligibleContent) => {}
            other => panic!("expected NoEligibleContent, got {:?}", other),
        }
    }

    #[test]
    fn test_text_only_post_passes_when_text_allowed() {
        let post = post("просто текст", vec![]);
        match accepts(&post, &community(ContentTypes::default()), &[]) {
            PolicyDecision::Allowed(publishable) => {
                assert_eq!(publishable.text.as_deref(), Some("просто текст"));
                assert!(publishable.attachments.is_empty());
            }
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[test]
    fn test_disallowed_text_is_stripped_but_attachments_pass() {
        let types = ContentTypes {
            text: false,
            ..ContentTypes::default()
        };
        let post = post("caption", vec![attachment(AttachmentKind::Photo)]);

        match accepts(&post, &community(types), &[]) {
            PolicyDecision::Allowed(publishable) => {
                assert!(publishable.text.is_none());
                assert_eq!(publishable.attachments.len(), 1);
            }
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_veto_is_case_insensitive() {
        let post = post(
            "Внимание, РЕКЛАМА нового товара",
            vec![
                attachment(AttachmentKind::Photo),
                attachment(AttachmentKind::Photo),
                attachment(AttachmentKind::Photo),
            ],
        );
        let keywords = vec!["реклама".to_string()];

        match accepts(&post, &community(ContentTypes::default()), &keywords) {
            PolicyDecision::Rejected(RejectReason::BlockedKeyword(keyword)) => {
                assert_eq!(keyword, "реклама");
            }
            other => panic!("expected BlockedKeyword, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_keywords_do_not_reject() {
        let post = post("обычная новость", vec![]);
        let keywords = vec!["спам".to_string(), "".to_string()];

        assert!(matches!(
            accepts(&post, &community(ContentTypes::default()), &keywords),
            PolicyDecision::Allowed(_)
        ));
    }
}
