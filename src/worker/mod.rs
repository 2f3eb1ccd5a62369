//! Worker engine: dispatch loop, handlers, and options.

pub mod engine;
pub mod handler;
pub mod options;

pub use engine::{Worker, run_worker};
pub use handler::{CommandHandler, Handler};
pub use options::{Reporter, WorkerOptions};
