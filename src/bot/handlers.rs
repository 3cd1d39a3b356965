//! Group message routing and relay
//!
//! Watches the configured group chat for per-user start/end report triggers,
//! forwards them to the private chat, and ships attached media to Drive.

use crate::config::Settings;
use crate::drive::DriveUploader;
use crate::state::{begin_session, end_session, FileSessionStore, SessionRecord};
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId};
use teloxide::utils::command::BotCommands;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Supported bot commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Các lệnh được hỗ trợ:")]
pub enum Command {
    /// Readiness acknowledgment
    #[command(description = "Kiểm tra bot đã sẵn sàng.")]
    Start,
}

/// Classification of a group message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The message opens a maintenance report
    Start,
    /// The message closes a maintenance report
    End,
}

impl Trigger {
    /// Phase suffix used in uploaded media filenames
    #[must_use]
    pub const fn phase_suffix(self) -> &'static str {
        match self {
            Self::Start => "batdau",
            Self::End => "ketthuc",
        }
    }
}

/// Lower-case and trim message text the way triggers are matched
fn normalize(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

/// Classify a message text as a start-trigger, end-trigger, or neither
///
/// Detection is substring-based over the normalized text; both the ASCII and
/// accented Vietnamese spellings count. Start wins when both phrases occur.
#[must_use]
pub fn classify(text: &str) -> Option<Trigger> {
    let text = normalize(text);
    if text.contains("bat dau") || text.contains("bắt đầu") {
        Some(Trigger::Start)
    } else if text.contains("ket thuc") || text.contains("kết thúc") {
        Some(Trigger::End)
    } else {
        None
    }
}

/// Format a timestamp the way folder and file names embed it
#[must_use]
pub fn format_timestamp(now: &DateTime<Local>) -> String {
    now.format("%Hh%M_%d-%m-%Y").to_string()
}

/// Local/remote filename for an uploaded media file
#[must_use]
pub fn media_file_name(timestamp: &str, trigger: Trigger, extension: &str) -> String {
    format!("{timestamp}_{}.{extension}", trigger.phase_suffix())
}

/// Remote folder name for a media upload
#[must_use]
pub fn folder_name(timestamp: &str) -> String {
    format!("DuyTu_{timestamp}")
}

/// Start and end text joined by a newline, as relayed to the private chat
#[must_use]
pub fn combined_summary(start_text: &str, end_text: &str) -> String {
    format!("{start_text}\n{end_text}")
}

/// Telegram user id of the message sender
#[must_use]
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0.cast_signed())
}

/// Handle the /start command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, "✅ Bot duy tu đã sẵn sàng.")
        .await?;
    Ok(())
}

/// Route one group message through the report lifecycle
///
/// Messages outside the configured group chat are ignored, as are messages
/// matching neither trigger and end-triggers from users with no open session.
///
/// # Errors
///
/// Returns an error if state persistence, Telegram calls, or the Drive
/// upload fail. Callers log the error; chat users never see it.
pub async fn handle_group_message(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    store: Arc<FileSessionStore>,
    drive: Arc<DriveUploader>,
) -> Result<()> {
    if msg.chat.id != ChatId(settings.chat_id_nhom) {
        return Ok(());
    }
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    // Captions are deliberately not consulted: a photo whose caption holds a
    // trigger phrase does not open or close a report.
    let text = normalize(msg.text().unwrap_or(""));
    let photo_id = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|photo| photo.file.id.clone());
    let video_id = msg.video().map(|video| video.file.id.clone());

    let timestamp = format_timestamp(&Local::now());
    let private_chat = ChatId(settings.chat_id_canhan);

    match classify(&text) {
        Some(Trigger::Start) => {
            let mut sessions = store.load()?;
            begin_session(
                &mut sessions,
                user_id,
                SessionRecord {
                    start_text: text,
                    photo_file_id: photo_id.as_ref().map(|id| id.0.clone()),
                    video_file_id: video_id.as_ref().map(|id| id.0.clone()),
                },
            );
            store.save(&sessions)?;
            info!("Recorded start of report for user {}", user_id);

            bot.forward_message(private_chat, msg.chat.id, msg.id).await?;
            bot.send_message(private_chat, "📌 Đã forward tin nhắn bắt đầu.")
                .await?;

            relay_media(&bot, &drive, photo_id, video_id, &timestamp, Trigger::Start).await?;
        }
        Some(Trigger::End) => {
            let mut sessions = store.load()?;
            // End-trigger with no open session is silently ignored
            let Some(record) = end_session(&mut sessions, user_id) else {
                return Ok(());
            };

            let summary = combined_summary(&record.start_text, &text);
            bot.send_message(private_chat, format!("📋 Tổng hợp:\n{summary}"))
                .await?;

            relay_media(&bot, &drive, photo_id, video_id, &timestamp, Trigger::End).await?;

            store.save(&sessions)?;
            info!("Closed report for user {}", user_id);
        }
        None => {}
    }

    Ok(())
}

/// Ship the message's attached media to Drive
///
/// Folder name derives from the timestamp of the *current* message, so a
/// session's start and end media can land in differently named folders.
async fn relay_media(
    bot: &Bot,
    drive: &DriveUploader,
    photo_id: Option<FileId>,
    video_id: Option<FileId>,
    timestamp: &str,
    trigger: Trigger,
) -> Result<()> {
    let folder = folder_name(timestamp);

    if let Some(file_id) = photo_id {
        let name = media_file_name(timestamp, trigger, "jpg");
        transfer_to_drive(bot, drive, file_id, &name, &folder).await?;
    }
    if let Some(file_id) = video_id {
        let name = media_file_name(timestamp, trigger, "mp4");
        transfer_to_drive(bot, drive, file_id, &name, &folder).await?;
    }
    Ok(())
}

/// Download one Telegram file to a local temp copy, upload it, remove the copy
async fn transfer_to_drive(
    bot: &Bot,
    drive: &DriveUploader,
    file_id: FileId,
    file_name: &str,
    folder: &str,
) -> Result<()> {
    let file = bot.get_file(file_id).await?;

    let path = Path::new(file_name);
    let mut dst = tokio::fs::File::create(path).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    drop(dst);

    drive.upload(path, folder).await?;

    // Best-effort cleanup; a leftover temp file is not worth failing the relay
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove local copy {}: {}", path.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_trigger_is_detected_in_both_spellings() {
        assert_eq!(classify("bat dau ca 1"), Some(Trigger::Start));
        assert_eq!(classify("sáng nay bắt đầu duy tu"), Some(Trigger::Start));
    }

    #[test]
    fn detection_is_case_insensitive_and_substring_based() {
        assert_eq!(classify("chúng ta BẮT ĐẦU nha"), Some(Trigger::Start));
        assert_eq!(classify("  KET THUC roi  "), Some(Trigger::End));
        assert_eq!(classify("đã kết thúc ca"), Some(Trigger::End));
    }

    #[test]
    fn start_wins_when_both_phrases_occur() {
        assert_eq!(classify("bat dau va ket thuc"), Some(Trigger::Start));
    }

    #[test]
    fn unrelated_text_matches_neither_trigger() {
        assert_eq!(classify("nghi trua"), None);
        assert_eq!(classify(""), None);
        // No normalization tricks: "batdau" without the space is not a phrase
        assert_eq!(classify("batdau"), None);
    }

    #[test]
    fn timestamp_format_matches_folder_convention() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 7, 8, 5, 0)
            .single()
            .expect("valid local time");
        assert_eq!(format_timestamp(&now), "08h05_07-03-2024");
    }

    #[test]
    fn media_names_carry_phase_suffix() {
        assert_eq!(
            media_file_name("08h05_07-03-2024", Trigger::Start, "jpg"),
            "08h05_07-03-2024_batdau.jpg"
        );
        assert_eq!(
            media_file_name("21h30_07-03-2024", Trigger::End, "mp4"),
            "21h30_07-03-2024_ketthuc.mp4"
        );
        assert_eq!(folder_name("08h05_07-03-2024"), "DuyTu_08h05_07-03-2024");
    }

    #[test]
    fn summary_joins_texts_with_newline() {
        assert_eq!(
            combined_summary("bat dau ca 1", "ket thuc, xong roi"),
            "bat dau ca 1\nket thuc, xong roi"
        );
    }
}
