pub mod access_gate;
pub mod catalog;
pub mod dashboard;
pub mod lifecycle;
pub mod session;
pub mod session_expiry;
