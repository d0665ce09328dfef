//! UI layer for the dashboard: app shell and panel renderers.

pub mod app;
pub mod panels;

pub use app::{DashboardApp, StartupConfig};
