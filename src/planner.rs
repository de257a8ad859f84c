//! Планирование отправок: один логический пост разворачивается в
//! упорядоченную последовательность SendUnit по правилу "одно вложение
//! на сообщение". Текст поста сопровождает только первую отправку.

use crate::models::{Attachment, PublishablePost, SendUnit};

/// Строит план отправок для прошедшего фильтры поста. Пост без вложений
/// даёт ровно одну текстовую отправку; порядок вложений сохраняется.
pub fn plan(post: &PublishablePost, source_url: &str) -> Vec<SendUnit> {
    if post.attachments.is_empty() {
        return vec![SendUnit {
            text: post.text.clone(),
            attachment: None,
            source_url: source_url.to_string(),
        }];
    }

    post.attachments
        .iter()
        .enumerate()
        .map(|(index, attachment)| {
            let text = if index == 0 { post.text.clone() } else { None };
            build_unit(attachment, text, source_url)
        })
        .collect()
}

fn build_unit(attachment: &Attachment, text: Option<String>, source_url: &str) -> SendUnit {
    if attachment.url.is_some() {
        return SendUnit {
            text,
            attachment: Some(attachment.clone()),
            source_url: source_url.to_string(),
        };
    }

    // Прямой ссылки на файл нет (обычно это видео, размещённое на стене):
    // вместо загрузки медиа отправляем ссылку на оригинальный пост,
    // иначе целевой API отклонит такую отправку.
    let mut lines = Vec::new();
    if let Some(text) = text {
        lines.push(text);
    }
    if let Some(title) = &attachment.title {
        lines.push(title.clone());
    }
    lines.push(source_url.to_string());

    SendUnit {
        text: Some(lines.join("\n")),
        attachment: None,
        source_url: source_url.to_string(),
    }
}
