use thiserror::Error;

pub type WxPayResult<T> = Result<T, WxPayError>;

/// Errors raised while talking to WeChat Pay or while assembling its configuration.
///
/// Payment and notification flows never hand these to their callers; they are
/// folded into `PaymentResult::Failure` or `NotifyResult::Rejected`. Only
/// `SandboxKey` and `Configuration` escape, from service construction.
#[derive(Debug, Error)]
pub enum WxPayError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Timeout error: provider did not answer in time")]
    Timeout,

    #[error("HTTP {status} from provider: {body}")]
    Http { status: u16, body: String },

    #[error("XML error: {message}")]
    Xml { message: String },

    #[error("Provider response signature is invalid")]
    InvalidSignature,

    #[error("Missing field in provider response: {field}")]
    MissingField { field: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Sandbox sign key unavailable: {message}")]
    SandboxKey { message: String },
}

impl WxPayError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn sandbox_key(message: impl Into<String>) -> Self {
        Self::SandboxKey {
            message: message.into(),
        }
    }

    /// True for errors that only stop service construction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SandboxKey { .. } | Self::Configuration { .. })
    }
}

impl From<reqwest::Error> for WxPayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WxPayError::Timeout
        } else if let Some(status) = err.status() {
            WxPayError::http(status.as_u16(), err.to_string())
        } else {
            WxPayError::network(format!("Request error: {}", err))
        }
    }
}

impl From<quick_xml::Error> for WxPayError {
    fn from(err: quick_xml::Error) -> Self {
        WxPayError::xml(err.to_string())
    }
}
