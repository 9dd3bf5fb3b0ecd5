//! Common types, traits, and error definitions for barrier_certificate
//!
//! This module provides the foundational building blocks shared by the
//! controller, the solvers and the dispatch pipeline.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
