//! WeChat Pay integration module
//!
//! Builds unified orders, starts QR code and mini program payments, and
//! validates payment notifications.

pub mod providers;
pub mod service;
pub mod traits;
pub mod types;
