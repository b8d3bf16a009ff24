//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → rate_limit.rs (per-client fixed window)
//!     → allowed: pass to forwarding
//!     → rejected: synthesized 429, upstream never contacted
//! ```
//!
//! # Design Decisions
//! - One limiter instance per route; no cross-route sharing
//! - Increment-and-check is a single locked step (no overshoot)
//! - Expired windows evicted lazily, never by a background task

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, Verdict};
