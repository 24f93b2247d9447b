//! WeChat Pay configuration
//!
//! `WxPayConfigInput` is what operators provide. `WxPayConfig` is the frozen
//! value the flows read, with the effective signing key resolved.

use base64::{engine::general_purpose, Engine as _};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

use super::sign::SignType;
use crate::error::{WxPayError, WxPayResult};
use crate::payments::traits::PaymentGateway;

pub const DEFAULT_DOMAIN: &str = "api.mch.weixin.qq.com";

/// Provider background reporting knobs, carried through untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub enabled: bool,
    pub worker_num: u32,
    pub queue_max_size: u32,
    pub batch_size: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_num: 6,
            queue_max_size: 10_000,
            batch_size: 10,
        }
    }
}

/// Raw WeChat Pay settings
#[derive(Clone)]
pub struct WxPayConfigInput {
    pub app_id: String,
    pub mch_id: String,
    /// Merchant API key (production key, also used to request the sandbox key)
    pub key: String,
    pub notify_url: String,
    pub use_sandbox: bool,
    /// API host, without scheme
    pub domain: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub report: ReportConfig,
    /// PKCS#12 merchant certificate
    pub cert: Option<Vec<u8>>,
}

impl std::fmt::Debug for WxPayConfigInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WxPayConfigInput")
            .field("app_id", &self.app_id)
            .field("mch_id", &self.mch_id)
            .field("key", &"***")
            .field("notify_url", &self.notify_url)
            .field("use_sandbox", &self.use_sandbox)
            .field("domain", &self.domain)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("report", &self.report)
            .field("cert", &self.cert.as_ref().map(|c| c.len()))
            .finish()
    }
}

impl WxPayConfigInput {
    pub fn new(
        app_id: impl Into<String>,
        mch_id: impl Into<String>,
        key: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            mch_id: mch_id.into(),
            key: key.into(),
            notify_url: notify_url.into(),
            use_sandbox: false,
            domain: DEFAULT_DOMAIN.to_string(),
            connect_timeout: Duration::from_millis(6000),
            read_timeout: Duration::from_millis(8000),
            report: ReportConfig::default(),
            cert: None,
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> WxPayResult<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| {
                WxPayError::configuration(format!("{} environment variable is required", name))
            })
        };
        let flag = |name: &str, default: bool| {
            std::env::var(name)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(default)
        };

        let defaults = ReportConfig::default();
        let report = ReportConfig {
            enabled: flag("WXPAY_AUTO_REPORT", defaults.enabled),
            worker_num: env_number("WXPAY_REPORT_WORKER_NUM", defaults.worker_num)?,
            queue_max_size: env_number("WXPAY_REPORT_QUEUE_MAX_SIZE", defaults.queue_max_size)?,
            batch_size: env_number("WXPAY_REPORT_BATCH_SIZE", defaults.batch_size)?,
        };

        let cert = match std::env::var("WXPAY_CERT_BASE64") {
            Ok(encoded) if !encoded.trim().is_empty() => Some(
                general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| {
                        WxPayError::configuration(format!("WXPAY_CERT_BASE64 is not valid base64: {}", e))
                    })?,
            ),
            _ => None,
        };

        Ok(Self {
            app_id: required("WXPAY_APP_ID")?,
            mch_id: required("WXPAY_MCH_ID")?,
            key: required("WXPAY_KEY")?,
            notify_url: required("WXPAY_NOTIFY_URL")?,
            use_sandbox: flag("WXPAY_USE_SANDBOX", false),
            domain: std::env::var("WXPAY_DOMAIN").unwrap_or_else(|_| DEFAULT_DOMAIN.to_string()),
            connect_timeout: Duration::from_millis(env_number("WXPAY_CONNECT_TIMEOUT_MS", 6000)?),
            read_timeout: Duration::from_millis(env_number("WXPAY_READ_TIMEOUT_MS", 8000)?),
            report,
            cert,
        })
    }

    pub fn validate(&self) -> WxPayResult<()> {
        let required = [
            ("app id", &self.app_id),
            ("merchant id", &self.mch_id),
            ("key", &self.key),
            ("notify url", &self.notify_url),
            ("domain", &self.domain),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(WxPayError::configuration(format!("{} cannot be empty", name)));
            }
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(WxPayError::configuration("timeouts must be greater than 0"));
        }

        if self.report.enabled && (self.report.worker_num == 0 || self.report.batch_size == 0) {
            return Err(WxPayError::configuration(
                "report worker count and batch size must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn env_number<T: FromStr>(name: &str, default: T) -> WxPayResult<T> {
    parse_number(name, std::env::var(name).ok(), default)
}

/// Out-of-range values are rejected rather than wrapped.
fn parse_number<T: FromStr>(name: &str, raw: Option<String>, default: T) -> WxPayResult<T> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| WxPayError::configuration(format!("{} must be a valid number", name))),
        None => Ok(default),
    }
}

/// Immutable configuration shared by every flow
#[derive(Clone)]
pub struct WxPayConfig {
    app_id: String,
    mch_id: String,
    key: String,
    notify_url: String,
    use_sandbox: bool,
    domain: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    report: ReportConfig,
    cert: Option<Vec<u8>>,
}

impl std::fmt::Debug for WxPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WxPayConfig")
            .field("app_id", &self.app_id)
            .field("mch_id", &self.mch_id)
            .field("notify_url", &self.notify_url)
            .field("use_sandbox", &self.use_sandbox)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl WxPayConfig {
    /// Freeze operator settings into the configuration used by the flows.
    ///
    /// In sandbox mode the signing key is exchanged through `gateway`; if that
    /// fails the service cannot sign anything, so the error is fatal.
    pub async fn build(
        input: WxPayConfigInput,
        gateway: &dyn PaymentGateway,
    ) -> WxPayResult<Self> {
        input.validate()?;

        let key = if input.use_sandbox {
            info!("Sandbox mode enabled, fetching sandbox sign key for mch_id={}", input.mch_id);
            let sandbox_key = gateway
                .fetch_sandbox_sign_key(&input.mch_id, &input.key)
                .await
                .map_err(|e| {
                    error!("Failed to fetch sandbox sign key: {}", e);
                    if matches!(e, WxPayError::SandboxKey { .. }) {
                        e
                    } else {
                        WxPayError::sandbox_key(e.to_string())
                    }
                })?;
            if sandbox_key.trim().is_empty() {
                return Err(WxPayError::sandbox_key("provider returned an empty sandbox key"));
            }
            sandbox_key
        } else {
            input.key
        };

        Ok(Self {
            app_id: input.app_id,
            mch_id: input.mch_id,
            key,
            notify_url: input.notify_url,
            use_sandbox: input.use_sandbox,
            domain: input.domain,
            connect_timeout: input.connect_timeout,
            read_timeout: input.read_timeout,
            report: input.report,
            cert: input.cert,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    /// Effective signing key (sandbox key when sandbox is on)
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn notify_url(&self) -> &str {
        &self.notify_url
    }

    pub fn use_sandbox(&self) -> bool {
        self.use_sandbox
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn report(&self) -> &ReportConfig {
        &self.report
    }

    pub fn cert(&self) -> Option<&[u8]> {
        self.cert.as_deref()
    }

    /// Sign type for outgoing API requests; the sandbox only accepts MD5.
    pub fn request_sign_type(&self) -> SignType {
        if self.use_sandbox {
            SignType::Md5
        } else {
            SignType::HmacSha256
        }
    }

    /// API path, routed through the sandbox prefix when needed.
    pub fn api_path(&self, path: &str) -> String {
        if self.use_sandbox {
            format!("/sandboxnew{}", path)
        } else {
            path.to_string()
        }
    }
}
