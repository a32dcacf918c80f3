//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper (job submission, history lookup, output
//! download), typed job results, and the fixed-interval completion poller
//! used by the sprite pipeline.

pub mod api;
pub mod history;
pub mod poller;
