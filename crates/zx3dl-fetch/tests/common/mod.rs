//! Common test infrastructure for zx3dl-fetch tests
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! - `mock_server`: wiremock setup helpers for artifact endpoints
//! - `builders`: items, engines and cache managers wired to a temp dir

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod mock_server;

pub use builders::*;
pub use mock_server::*;
