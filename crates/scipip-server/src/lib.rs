//! HTTP surface of scipip.
//!
//! The binary (`scipip`) builds one [`scipip_core::AppContext`] at startup
//! and serves it through the router from [`api::build_router`].

pub mod api;
pub mod error;

pub use api::{ApiState, build_router};
pub use error::ApiError;
