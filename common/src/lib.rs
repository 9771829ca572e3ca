pub mod env_config;
pub mod error;
pub mod http;
pub mod jwt;

// Re-export commonly used items for convenience
pub use error::{AppError, Res};
pub use http::Success;
pub use jwt::Principal;
