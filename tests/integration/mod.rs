//! Integration tests for the Tollgate gateway
//!
//! These tests drive the full router (principal middleware, forwarding
//! engine, error rendering) against a wiremock upstream.

mod quota;
mod security;
