pub mod catalog_refresh;
pub mod config;
pub mod dummy_payment_gateway;
pub mod http_client;
pub mod setup;
