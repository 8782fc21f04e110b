//! Core types and trait definitions for the Tally leaderboard service.
//!
//! This crate is free of HTTP, database, and cache dependencies. Backends
//! implement the traits in [`store`] and [`cache`]; the service crate composes
//! them with the ranking rules in [`rank`].

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures instead.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod challenge;
pub mod error;
pub mod leaderboard;
pub mod rank;
pub mod score;
pub mod store;
pub mod user;

pub use error::{Error, Result};
