pub mod config;
pub mod entity;
pub mod errors;
pub mod message;
pub mod reply;

pub use entity::{
    select_top_entity, EntityCandidate, EntityMap, EntityValue, SelectionResult,
    CONFIDENCE_THRESHOLD,
};
pub use errors::{ExternalService, IntegrationError};
pub use message::InboundMessage;
pub use reply::{Category, ReplyAction};
