//! Payment types and data structures
//!
//! Orders going out to WeChat Pay and the typed outcomes coming back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat key/value payload exchanged with the provider.
///
/// A `BTreeMap` keeps keys sorted, which is also the order signatures are computed in.
pub type PayloadMap = BTreeMap<String, String>;

/// Merchant order submitted for payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique merchant order number (`out_trade_no`)
    pub id: String,
    /// Description shown to the payer
    pub body: String,
    /// Currency code (CNY, ...)
    pub fee_type: String,
    /// Amount in the smallest currency unit, as an integer string
    pub total_fee: String,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        fee_type: impl Into<String>,
        total_fee: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            fee_type: fee_type.into(),
            total_fee: total_fee.into(),
        }
    }

    /// Reject orders the provider would refuse outright.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("order id cannot be empty".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("order body cannot be empty".to_string());
        }
        if self.fee_type.trim().is_empty() {
            return Err("fee type cannot be empty".to_string());
        }
        match self.total_fee.parse::<u64>() {
            Ok(fee) if fee > 0 => Ok(()),
            _ => Err(format!(
                "total fee must be a positive integer, got '{}'",
                self.total_fee
            )),
        }
    }
}

/// Payment channel requested from the unified order API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    /// QR code scanned by the payer
    Native,
    /// Official account / mini program
    Jsapi,
    /// Native mobile app
    App,
    /// Mobile web (H5)
    Mweb,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Native => "NATIVE",
            TradeType::Jsapi => "JSAPI",
            TradeType::App => "APP",
            TradeType::Mweb => "MWEB",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a payment initiation.
///
/// Exactly one of the two states holds. `Success` always carries a usable
/// handle and `Failure` always carries a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentResult<T> {
    Success(T),
    Failure {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
}

impl<T> PaymentResult<T> {
    const FALLBACK_MESSAGE: &'static str = "payment request failed";

    pub fn failure(code: Option<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            Self::FALLBACK_MESSAGE.to_string()
        } else {
            message
        };
        PaymentResult::Failure {
            code: code.filter(|c| !c.is_empty()),
            message,
        }
    }

    /// Failure without provider detail
    pub fn generic_failure() -> Self {
        Self::failure(None, Self::FALLBACK_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResult::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            PaymentResult::Success(value) => Some(value),
            PaymentResult::Failure { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            PaymentResult::Failure { code, .. } => code.as_deref(),
            PaymentResult::Success(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PaymentResult::Failure { message, .. } => Some(message),
            PaymentResult::Success(_) => None,
        }
    }
}

/// QR code flow handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativePayment {
    /// URL to render as a QR code
    pub code_url: String,
}

/// Parameters a mini program passes to `wx.requestPayment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsapiPayParams {
    pub app_id: String,
    pub time_stamp: String,
    pub nonce_str: String,
    pub package: String,
    pub prepay_id: String,
    pub sign_type: String,
    pub pay_sign: String,
}

/// Why an inbound notification was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyRejection {
    MalformedBody(String),
    SignatureInvalid,
    MerchantIdMismatch,
    AppIdMismatch,
    MissingOrderId,
}

impl fmt::Display for NotifyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyRejection::MalformedBody(detail) => write!(f, "malformed body: {}", detail),
            NotifyRejection::SignatureInvalid => f.write_str("signature invalid"),
            NotifyRejection::MerchantIdMismatch => f.write_str("merchant id mismatch"),
            NotifyRejection::AppIdMismatch => f.write_str("app id mismatch"),
            NotifyRejection::MissingOrderId => f.write_str("missing out_trade_no"),
        }
    }
}

/// Outcome of validating a payment notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyResult {
    Accepted {
        order_id: String,
        /// XML to echo back to the provider
        ack_body: String,
        /// Every field of the notification, for further checks by the caller
        fields: PayloadMap,
    },
    Rejected {
        reason: NotifyRejection,
    },
}

impl NotifyResult {
    pub fn rejected(reason: NotifyRejection) -> Self {
        NotifyResult::Rejected { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NotifyResult::Accepted { .. })
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            NotifyResult::Accepted { order_id, .. } => Some(order_id),
            NotifyResult::Rejected { .. } => None,
        }
    }

    pub fn ack_body(&self) -> Option<&str> {
        match self {
            NotifyResult::Accepted { ack_body, .. } => Some(ack_body),
            NotifyResult::Rejected { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            NotifyResult::Rejected { reason } => Some(reason.to_string()),
            NotifyResult::Accepted { .. } => None,
        }
    }
}
