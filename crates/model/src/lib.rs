//! Serializable data model for the labflow laboratory-workflow API.
//!
//! Everything here is a value object: entities round-trip through JSON
//! losslessly, absent optional fields stay absent (omitted keys, never
//! `null`), and there is no I/O. The query/mutation layer lives in the
//! `client_core` crate.

pub mod block;
pub mod domain;
pub mod entity;
pub mod error;
