//! Foundation types for Chronicle.
//!
//! Every other Chronicle crate depends on `chron-types`. It carries the
//! content-addressed [`ObjectId`] and the provenance types recorded on
//! commits and ref updates.
//!
//! # Key Types
//!
//! - [`ObjectId`] - Content-addressed identifier (BLAKE3 hash)
//! - [`Identity`] - Display name and email of a committer or author
//! - [`Signature`] - An identity paired with a timezone-aware timestamp

pub mod error;
pub mod identity;
pub mod object;

pub use error::TypeError;
pub use identity::{Identity, Signature};
pub use object::ObjectId;
