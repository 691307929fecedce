//! Content hashing for Chronicle.
//!
//! Object ids are BLAKE3 digests over a framed encoding of the object:
//! `"<kind> <len>\0"` followed by the payload. Framing by kind keeps a blob
//! and a tree with identical bytes from colliding, and the length prefix
//! makes the encoding unambiguous.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
