//! Payment provider implementations
//!
//! Concrete implementations of the PaymentGateway trait.

pub mod wxpay;

pub use wxpay::WxPayClient;
