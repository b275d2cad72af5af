//! Agent Runtime - intent classification and reply routing
//!
//! This crate turns an inbound chat message into the text the bot answers with:
//! - **Classification** (`nlu`) - send message text to Wit.ai, get entities per category
//! - **Selection** - pick the single most confident entity (see `witty_core::entity`)
//! - **Routing** (`router`) - canned replies, or a Wolfram|Alpha spoken answer (`knowledge`)
//!
//! # Architecture
//!
//! ```text
//! InboundMessage → IntentClassifier → select_top_entity → ReplyRouter → reply text
//!                                                             ↓
//!                                                      KnowledgeQuery
//! ```
//!
//! # Key Types
//!
//! - `AgentRuntime` - classify → select → route for one message
//! - `IntentClassifier` / `KnowledgeQuery` - seams for the external services
//! - `WitClient` / `WolframClient` - reqwest-backed implementations

pub mod knowledge;
pub mod nlu;
pub mod router;
pub mod runtime;

pub use knowledge::{KnowledgeQuery, WolframClient};
pub use nlu::{IntentClassifier, WitClient};
pub use router::ReplyRouter;
pub use runtime::AgentRuntime;
