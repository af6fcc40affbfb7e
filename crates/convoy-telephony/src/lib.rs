pub mod client;
pub mod twiml;
pub mod webhook;

pub use client::TwilioClient;
pub use webhook::CallPayload;
