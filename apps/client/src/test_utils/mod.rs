//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory implementations of every port, with failure injection

mod catalog_mocks;
mod factories;
mod identity_mocks;

pub use catalog_mocks::*;
pub use factories::*;
pub use identity_mocks::*;
