mod jwt;
mod middleware;

pub use jwt::{ACCESS_TOKEN_TTL_HOURS, AccessTokenDetails, JwtError, JwtService};
pub use middleware::{RequestContext, bearer_token, require_user};
