pub mod auth;
pub mod rate_limit;
pub mod response;

pub use auth::{optional_auth, require_auth};
pub use rate_limit::{rate_limit, ApiRateLimiter};
pub use response::{ApiResponse, ApiResult};
