//! Lifekit - journal, study and recipe helpers behind a per-client rate limiter
//!
//! This crate implements the request handling of a small backend: sentiment
//! scoring of journal text, flashcard generation, recipe suggestion and
//! payment-session creation. Guarded operations pass through an in-process
//! sliding-window rate limiter keyed by client address before calling an
//! external service or its local fallback and persisting the result.

pub mod config;
pub mod envcheck;
pub mod error;
pub mod fallback;
pub mod models;
pub mod ratelimit;
pub mod service;
pub mod store;
pub mod upstream;
pub mod validation;
