//! Payment gateway trait definitions
//!
//! The seam between the payment flows and the provider's HTTP API.

use crate::error::WxPayResult;
use crate::payments::providers::wxpay::config::WxPayConfig;
use crate::payments::types::PayloadMap;
use async_trait::async_trait;

/// Provider client used by `WxPayService`
///
/// `WxPayClient` talks to WeChat Pay over HTTP; tests substitute their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Call the unified order API
    ///
    /// The implementation fills in `appid`, `mch_id`, `nonce_str`, `sign_type`
    /// and `sign` from `config`. A response with `return_code` other than
    /// SUCCESS is returned as-is; a SUCCESS response must carry a valid signature.
    ///
    /// # Arguments
    /// * `config` - Frozen provider configuration
    /// * `payload` - Business fields built from the order
    ///
    /// # Returns
    /// * `PayloadMap` - Decoded response fields
    async fn unified_order(&self, config: &WxPayConfig, payload: PayloadMap) -> WxPayResult<PayloadMap>;

    /// Exchange the merchant key for a sandbox signing key
    ///
    /// # Arguments
    /// * `mch_id` - Merchant id
    /// * `key` - Production merchant key, used to sign this request
    ///
    /// # Returns
    /// * `String` - The `sandbox_signkey` issued by the provider
    async fn fetch_sandbox_sign_key(&self, mch_id: &str, key: &str) -> WxPayResult<String>;
}
