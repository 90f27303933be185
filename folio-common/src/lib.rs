//! An internal crate containing the bit and byte readers reused across the
//! different folio crates.
//!
//! This crate is not meant for external consumption.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bit;
pub mod byte;
