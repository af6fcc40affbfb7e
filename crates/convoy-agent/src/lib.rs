pub mod instructions;
pub mod notify;
pub mod postcall;

pub use instructions::{build_instructions, AssembledInstructions};
pub use postcall::finish_call;
