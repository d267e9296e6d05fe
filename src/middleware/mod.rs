pub mod auth;
pub mod response;

pub use auth::{require_api_session, require_page_session};
pub use response::ApiResponse;
