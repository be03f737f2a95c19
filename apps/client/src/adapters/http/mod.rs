//! reqwest implementations of the identity and catalog service ports.

pub mod api_client;
pub mod catalog;
pub mod identity;

pub use api_client::ApiClient;
pub use catalog::HttpCatalogService;
pub use identity::HttpIdentityService;
