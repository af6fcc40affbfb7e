pub mod flow;
pub mod handlers;
pub mod server;
pub mod session;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use session::{BridgeFactory, CallSession, RealtimeBridgeFactory, SessionRegistry};
