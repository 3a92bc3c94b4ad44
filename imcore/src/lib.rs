pub mod app_resolver;
pub mod config;
pub mod context;
pub mod contact_client;
pub mod device_resolver;
pub mod error;
pub mod identity_validator;
pub mod idp_inspector;
pub mod jwt_verifier;
pub mod log_value;
pub mod pipeline;
pub mod schemes;
pub mod session;
pub mod token_codec;

pub use error::{CoreError, CoreErrorKind};
