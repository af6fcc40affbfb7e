pub mod extraction;
pub mod greeting;
pub mod realtime;

pub mod mock;

pub use extraction::OpenAiContactExtractor;
pub use greeting::OpenAiGreetingSynthesizer;
pub use realtime::RealtimeVoiceBridge;
