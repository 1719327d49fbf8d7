//! Utility modules for the admin tool.

pub mod mime;
