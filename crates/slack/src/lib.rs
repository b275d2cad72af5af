//! Slack Integration - real-time event ingestion and replies
//!
//! This crate provides the Slack side of witty:
//! - **Socket loop** (`socket`) - ordered envelope pump with reconnection logic
//! - **Transport** (`transport`) - WebSocket connection over Socket Mode or RTM
//! - **Events** (`events`) - event decoding, bot filtering, per-message task spawning
//! - **Web API** (`web`) - `chat.postMessage` and connection bootstrap calls
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps with a bot user
//! 2. Set `SLACK_ACCESS_TOKEN` to the bot token (`xoxb-...`)
//! 3. Optionally enable Socket Mode and set `SLACK_APP_TOKEN` (`xapp-...`);
//!    without it the classic RTM API is used
//!
//! # Architecture
//!
//! ```text
//! WebSocketTransport → SocketRunner → EventDispatcher → MessageHandler
//!                                                           ↓ (one task per message)
//!                                                     MessageService → MessagePoster
//! ```

pub mod events;
pub mod socket;
pub mod transport;
pub mod web;
