pub mod catalog_service;
pub mod identity_service;
pub mod payment_gateway;
pub mod session_storage;
