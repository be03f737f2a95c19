//! Shared types for the Suscridash client and its collaborators.
//!
//! This crate provides:
//! - Actor roles (`Role`) as carried in tokens and identity payloads
//! - Status enums with explicit transition tables for businesses, plans
//!   and subscriptions
//! - Identity-service request/response DTOs and the structured error body
//! - An unverified JWT claims peek used for local expiry pre-checks

mod claims;
mod errors;
mod responses;
mod role;
mod subscription;

pub use claims::{TokenClaims, peek_claims};
pub use errors::{ApiErrorBody, ErrorCode, JwtError};
pub use responses::{LoginRequest, LoginResponse, MeResponse, RegisterRequest, UserDto};
pub use role::Role;
pub use subscription::{BusinessStatus, PlanStatus, SubscriptionStatus};
