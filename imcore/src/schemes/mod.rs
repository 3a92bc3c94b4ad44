pub mod jwt_auth;
pub mod session_auth;
pub mod upstream_idp_auth;

pub use jwt_auth::JwtAuthScheme;
pub use session_auth::SessionAuthScheme;
pub use upstream_idp_auth::UpstreamIdpAuthScheme;
