//! Bridge between the egui thread and the backend tokio runtime.

pub mod commands;
pub mod runtime;
