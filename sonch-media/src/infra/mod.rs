//! Infrastructure shared by the domains: HTTP, retry, configuration and
//! session storage.

pub mod api_client;
pub mod api_types;
pub mod config;
pub mod constants;
pub mod retry;
pub mod services;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api_client::ApiClient;
pub use api_types::*;
pub use config::MediaConfig;
