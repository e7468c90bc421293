pub mod compile;
pub mod execute;
pub mod health;

pub use compile::compile_handler;
pub use execute::execute_handler;
pub use health::{health_handler, ready_handler};
