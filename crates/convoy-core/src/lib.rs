pub mod collab;
pub mod config;
pub mod errors;
pub mod ids;
pub mod phone;

pub use collab::{CarrierLine, ContactExtractor, GreetingSynthesizer, MediaBridge};
pub use config::Settings;
pub use errors::GatewayError;
pub use ids::{AssistantId, CallSid, CarrierId, ConversationId};
pub use phone::{PhoneError, PhoneNumber};
