//! `haven-core` — shared building blocks for the scheduling portal.
//!
//! This crate contains only identifiers and the domain error model (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{FacilityId, UserId};
