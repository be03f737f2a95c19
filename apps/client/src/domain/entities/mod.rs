pub mod business;
pub mod card;
pub mod coupon;
pub mod payment_scenario;
pub mod plan;
pub mod principal;
pub mod route_table;
pub mod settings;
pub mod subscription;
