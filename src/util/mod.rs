//! Small shared utilities.

pub mod json;
