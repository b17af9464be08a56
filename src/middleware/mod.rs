pub mod auth;
pub mod response;

pub use auth::{client_ip, session_auth_middleware};
pub use response::{ApiResponse, ApiResult};
