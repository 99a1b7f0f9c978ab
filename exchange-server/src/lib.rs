pub mod config;
pub mod server;

pub use config::Config;
pub use server::{create_router, AppState};
