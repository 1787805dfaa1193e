pub mod auth;
pub mod response;

pub use auth::{require_token, Principal};
pub use response::{ApiResponse, ApiResult};
