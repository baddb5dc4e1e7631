mod auth_service_fake;
mod auth_service_impl;
mod identity_gateway_static;
mod keys;
mod refresh_coordinator;
mod session_manager;
mod token_codec_impl;

pub use auth_service_fake::*;
pub use auth_service_impl::*;
pub use identity_gateway_static::*;
pub use refresh_coordinator::*;
pub use session_manager::*;
pub use token_codec_impl::*;
