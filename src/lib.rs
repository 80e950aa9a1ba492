pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod meetings;
pub mod mesh;
pub mod security;
pub mod state;
pub mod ws;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
