//! Application settings

mod config;
mod loader;

pub use config::AppConfig;
pub use loader::load_config;
