//! Core types, decision logic and the tracking service for Trailguard.
//!
//! This crate is free of HTTP and SQL. Storage backends implement
//! [`store::TrackingStore`]; the HTTP layer talks to
//! [`service::TrackingService`] only.

// Native `async fn` in traits; futures are bounded `Send` explicitly.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod location;
pub mod rate_limit;
pub mod retry;
pub mod service;
pub mod store;
pub mod tourist;
pub mod validate;

pub use error::{Error, Result};
