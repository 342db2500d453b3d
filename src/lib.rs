// Core modules
pub mod api;
pub mod config;
pub mod history;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod screener;

// Re-export commonly used types
pub use models::*;
pub use registry::CandidateRegistry;
pub use screener::{ScreenConfig, Screener};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
