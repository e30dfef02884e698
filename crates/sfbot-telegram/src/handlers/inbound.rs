//! Telegram `Message` → core `IncomingUpdate` mapping.

use teloxide::types::Message;

use sfbot_core::{
    domain::{ChatId, UserId},
    messaging::types::{AttachmentKind, AttachmentMessage, Command, IncomingUpdate, TextMessage},
};

/// `bot_username` filters out commands addressed to other bots in group chats.
pub fn to_incoming(msg: &Message, bot_username: Option<&str>) -> IncomingUpdate {
    let chat_id = ChatId(msg.chat.id.0);
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if let Some(text) = msg.text() {
        if let Some(cmd) = Command::parse(chat_id, user_id, text, bot_username) {
            return IncomingUpdate::Command(cmd);
        }
    }

    if let Some((kind, file_ids)) = attachment(msg) {
        return IncomingUpdate::Attachment(AttachmentMessage {
            chat_id,
            user_id,
            kind,
            file_ids,
        });
    }

    // Plain text and every unsupported message type (stickers, voice, ...).
    IncomingUpdate::Text(TextMessage {
        chat_id,
        user_id,
        text: msg.text().or_else(|| msg.caption()).unwrap_or("").to_string(),
    })
}

fn attachment(msg: &Message) -> Option<(AttachmentKind, Vec<String>)> {
    if let Some(photos) = msg.photo() {
        // Telegram lists sizes smallest first.
        let ids = photos.iter().map(|p| p.file.id.clone()).collect();
        return Some((AttachmentKind::Photo, ids));
    }
    if let Some(video) = msg.video() {
        return Some((AttachmentKind::Video, vec![video.file.id.clone()]));
    }
    if let Some(audio) = msg.audio() {
        return Some((AttachmentKind::Audio, vec![audio.file.id.clone()]));
    }
    if let Some(doc) = msg.document() {
        return Some((AttachmentKind::Document, vec![doc.file.id.clone()]));
    }
    None
}
