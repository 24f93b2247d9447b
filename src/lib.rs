//! WeChat Pay merchant backend
//!
//! Unified order requests for QR code and mini program payments, and validation
//! of asynchronous payment notifications.

pub mod error;
pub mod payments;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod config;

pub use error::{WxPayError, WxPayResult};
pub use payments::providers::wxpay::config::{ReportConfig, WxPayConfig, WxPayConfigInput};
pub use payments::service::WxPayService;
pub use payments::traits::PaymentGateway;
pub use payments::types::{
    JsapiPayParams, NativePayment, NotifyRejection, NotifyResult, Order, PaymentResult,
    PayloadMap, TradeType,
};
