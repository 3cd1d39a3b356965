//! Bot báo cáo duy tu
//!
//! A Telegram relay bot that watches a maintenance group chat for per-user
//! start/end report triggers, forwards them to a private chat, and uploads
//! attached media to Google Drive.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Google Drive media uploads
pub mod drive;
/// Session state persistence
pub mod state;
