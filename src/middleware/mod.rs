mod project_access;
mod user_auth;

pub use project_access::*;
pub use user_auth::*;
