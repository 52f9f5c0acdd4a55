//! Token verification and public path classification.
//!
//! Both components are pure: they are built once from [`Config`](crate::Config)
//! and only read at request time, so they can be shared across requests
//! without locking.

pub mod paths;
pub mod token;

pub use paths::PublicPaths;
pub use token::{Claims, TokenError, TokenVerifier};
