//! Middleware module
//!
//! Contains Tower middleware for principal extraction.

pub mod principal;
