//! WeChat Pay v2 provider implementation
//!
//! Signs requests, exchanges XML with the merchant API and verifies response
//! signatures. Only the calls the payment flows need are implemented.

pub mod config;
pub mod sign;
pub mod xml;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use self::config::{WxPayConfig, WxPayConfigInput};
use self::sign::{is_signature_valid, sign_payload, SignType, FIELD_SIGN_TYPE};
use self::xml::{from_xml, to_xml};
use crate::error::{WxPayError, WxPayResult};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::PayloadMap;

pub const UNIFIED_ORDER_PATH: &str = "/pay/unifiedorder";
pub const SANDBOX_SIGN_KEY_PATH: &str = "/sandboxnew/pay/getsignkey";

pub const FIELD_RETURN_CODE: &str = "return_code";
pub const FIELD_RETURN_MSG: &str = "return_msg";
pub const FIELD_RESULT_CODE: &str = "result_code";
pub const FIELD_ERR_CODE: &str = "err_code";
pub const FIELD_ERR_CODE_DES: &str = "err_code_des";
pub const SUCCESS: &str = "SUCCESS";
pub const FAIL: &str = "FAIL";

const SANDBOX_CONNECT_TIMEOUT: Duration = Duration::from_millis(8000);
const SANDBOX_READ_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Random 32 character nonce
pub fn nonce_str() -> String {
    Uuid::new_v4().simple().to_string()
}

/// HTTP client for the WeChat Pay merchant API
pub struct WxPayClient {
    http_client: Client,
    sandbox_client: Client,
    domain: String,
}

impl WxPayClient {
    /// Create a client honouring the configured connect and read timeouts
    pub fn new(input: &WxPayConfigInput) -> WxPayResult<Self> {
        let user_agent = format!("wxpay-backend/{} ({})", env!("CARGO_PKG_VERSION"), input.mch_id);

        let http_client = Client::builder()
            .connect_timeout(input.connect_timeout)
            .read_timeout(input.read_timeout)
            .user_agent(user_agent.clone())
            .build()
            .map_err(|e| {
                WxPayError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let sandbox_client = Client::builder()
            .connect_timeout(SANDBOX_CONNECT_TIMEOUT)
            .read_timeout(SANDBOX_READ_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                WxPayError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            sandbox_client,
            domain: input.domain.clone(),
        })
    }

    fn url(domain: &str, path: &str) -> String {
        if domain.starts_with("http://") || domain.starts_with("https://") {
            format!("{}{}", domain.trim_end_matches('/'), path)
        } else {
            format!("https://{}{}", domain.trim_end_matches('/'), path)
        }
    }

    async fn post_xml(client: &Client, url: &str, body: String) -> WxPayResult<String> {
        debug!("POST {}", url);

        let response = client
            .post(url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("WeChat Pay request to {} failed: {}", url, e);
                WxPayError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!("WeChat Pay answered HTTP {} for {}", status, url);
            return Err(WxPayError::http(status.as_u16(), text));
        }
        Ok(text)
    }
}

/// Validate a decoded API response.
///
/// FAIL responses are unsigned and handed back untouched; SUCCESS responses
/// must verify against the merchant key.
pub fn check_response(
    response: PayloadMap,
    key: &str,
    sign_type: SignType,
) -> WxPayResult<PayloadMap> {
    let return_code = response
        .get(FIELD_RETURN_CODE)
        .map(|c| c.trim().to_ascii_uppercase())
        .ok_or_else(|| WxPayError::protocol("response has no return_code"))?;

    if return_code != SUCCESS {
        return Ok(response);
    }

    if !is_signature_valid(&response, key, sign_type) {
        warn!("WeChat Pay response failed signature verification");
        return Err(WxPayError::InvalidSignature);
    }
    Ok(response)
}

#[async_trait]
impl PaymentGateway for WxPayClient {
    async fn unified_order(
        &self,
        config: &WxPayConfig,
        mut payload: PayloadMap,
    ) -> WxPayResult<PayloadMap> {
        let sign_type = config.request_sign_type();
        payload.insert("appid".to_string(), config.app_id().to_string());
        payload.insert("mch_id".to_string(), config.mch_id().to_string());
        payload.insert("nonce_str".to_string(), nonce_str());
        payload.insert(FIELD_SIGN_TYPE.to_string(), sign_type.to_string());
        sign_payload(&mut payload, config.key(), sign_type)?;

        let url = Self::url(config.domain(), &config.api_path(UNIFIED_ORDER_PATH));
        let body = to_xml(&payload)?;
        let text = Self::post_xml(&self.http_client, &url, body).await?;
        let response = from_xml(&text)?;

        check_response(response, config.key(), sign_type)
    }

    async fn fetch_sandbox_sign_key(&self, mch_id: &str, key: &str) -> WxPayResult<String> {
        let mut payload = PayloadMap::new();
        payload.insert("mch_id".to_string(), mch_id.to_string());
        payload.insert("nonce_str".to_string(), nonce_str());
        sign_payload(&mut payload, key, SignType::Md5)?;

        let url = Self::url(&self.domain, SANDBOX_SIGN_KEY_PATH);
        let text = Self::post_xml(&self.sandbox_client, &url, to_xml(&payload)?).await?;
        let response = from_xml(&text)?;

        match response.get(FIELD_RETURN_CODE).map(String::as_str) {
            Some(SUCCESS) => response
                .get("sandbox_signkey")
                .filter(|k| !k.is_empty())
                .cloned()
                .ok_or_else(|| WxPayError::missing_field("sandbox_signkey")),
            _ => Err(WxPayError::sandbox_key(
                response
                    .get(FIELD_RETURN_MSG)
                    .cloned()
                    .unwrap_or_else(|| "sandbox key request refused".to_string()),
            )),
        }
    }
}
