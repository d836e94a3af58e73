pub mod config;
pub mod error;
pub mod server;
pub mod signature;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{ApiServer, AppState};
