//! # Web API Request Handlers
//!
//! HTTP request handlers organized by resource.

pub mod consumption;
pub mod health;
pub mod projects;
