#[cfg(feature = "jwt-auth")]
pub mod auth;
pub mod rate_limit;
