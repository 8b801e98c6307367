//! `warden-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the rule engine and
//! its storage glue (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod specifier;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RuleId, SpecifierId};
pub use specifier::Specifier;
pub use value_object::ValueObject;
