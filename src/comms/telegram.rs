//! Telegram reply delivery.
//!
//! Text goes out in HTML parse mode, split to stay under the per-message
//! limit. Preformatted replies are escaped and wrapped in `<pre>` chunk by
//! chunk so no chunk ever breaks an entity or a tag.

use teloxide::Bot;
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, InputFile, ParseMode};
use teloxide::utils::html;
use tracing::{debug, warn};

use crate::dispatch::{FAILED_REPLY, Reply};

// ── Constants ────────────────────────────────────────────────────────────────

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

// ── Sending ──────────────────────────────────────────────────────────────────

/// Deliver one reply. A failed chunk is logged and the rest still sent; a
/// photo that cannot be delivered is replaced by the generic failure text.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) {
    match reply {
        Reply::Text(text) => {
            for chunk in chunk_text(&text, MAX_MESSAGE_LENGTH) {
                send_html(bot, chat_id, chunk).await;
            }
        }
        Reply::Code(code) => {
            for chunk in chunk_preformatted(&code, MAX_MESSAGE_LENGTH) {
                send_html(bot, chat_id, chunk).await;
            }
        }
        Reply::Photo { bytes, file_name } => {
            debug!(chat_id = chat_id.0, len = bytes.len(), %file_name, "sending photo");
            let photo = InputFile::memory(bytes).file_name(file_name);
            if let Err(e) = bot.send_photo(chat_id, photo).await {
                warn!(chat_id = chat_id.0, "failed to send photo: {e}");
                send_html(bot, chat_id, FAILED_REPLY.to_string()).await;
            }
        }
    }
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: String) {
    if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
        warn!(chat_id = chat_id.0, "failed to send telegram reply: {e}");
    }
}

// ── Chunking ─────────────────────────────────────────────────────────────────

/// Split on character boundaries into chunks of at most `limit` chars.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return vec!["(empty response)".to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(limit.max(1)).map(|c| c.iter().collect()).collect()
}

/// Escape `text` and wrap it in `<pre>` blocks whose full length, tags
/// included, stays within `limit` chars.
pub fn chunk_preformatted(text: &str, limit: usize) -> Vec<String> {
    let budget = limit.saturating_sub(PRE_OPEN.len() + PRE_CLOSE.len()).max(8);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let escaped = html::escape(c.encode_utf8(&mut buf));
        let len = escaped.chars().count();
        if current_len + len > budget && !current.is_empty() {
            chunks.push(format!("{PRE_OPEN}{current}{PRE_CLOSE}"));
            current.clear();
            current_len = 0;
        }
        current.push_str(&escaped);
        current_len += len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(format!("{PRE_OPEN}{current}{PRE_CLOSE}"));
    }
    chunks
}
