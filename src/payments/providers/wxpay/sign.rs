//! WeChat Pay v2 request signatures
//!
//! Sorted `k=v` pairs joined by `&`, the merchant key appended as `&key=...`,
//! then MD5 or HMAC-SHA256, uppercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::{WxPayError, WxPayResult};
use crate::payments::types::PayloadMap;

pub const FIELD_SIGN: &str = "sign";
pub const FIELD_SIGN_TYPE: &str = "sign_type";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignType {
    Md5,
    HmacSha256,
}

impl SignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignType::Md5 => "MD5",
            SignType::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Sign type declared by a notification; absent means MD5.
    pub fn from_field(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => Some(SignType::Md5),
            Some(v) if v.eq_ignore_ascii_case("MD5") => Some(SignType::Md5),
            Some(v) if v.eq_ignore_ascii_case("HMAC-SHA256") => Some(SignType::HmacSha256),
            Some(_) => None,
        }
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn string_to_sign(data: &PayloadMap, key: &str) -> String {
    let mut joined = data
        .iter()
        .filter(|(k, v)| k.as_str() != FIELD_SIGN && !v.trim().is_empty())
        .map(|(k, v)| format!("{}={}", k, v.trim()))
        .collect::<Vec<_>>()
        .join("&");
    joined.push_str("&key=");
    joined.push_str(key);
    joined
}

pub fn generate_signature(data: &PayloadMap, key: &str, sign_type: SignType) -> WxPayResult<String> {
    let plain = string_to_sign(data, key);
    match sign_type {
        SignType::Md5 => Ok(format!("{:X}", md5::compute(plain.as_bytes()))),
        SignType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key.as_bytes())
                .map_err(|e| WxPayError::configuration(format!("invalid signing key: {}", e)))?;
            mac.update(plain.as_bytes());
            Ok(hex::encode_upper(mac.finalize().into_bytes()))
        }
    }
}

/// Check the `sign` field of `data`. A missing signature is invalid.
pub fn is_signature_valid(data: &PayloadMap, key: &str, sign_type: SignType) -> bool {
    let Some(provided) = data.get(FIELD_SIGN) else {
        return false;
    };
    match generate_signature(data, key, sign_type) {
        Ok(computed) => constant_time_eq(computed.as_bytes(), provided.trim().as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Attach `sign` to an outgoing payload
pub fn sign_payload(data: &mut PayloadMap, key: &str, sign_type: SignType) -> WxPayResult<()> {
    let signature = generate_signature(data, key, sign_type)?;
    data.insert(FIELD_SIGN.to_string(), signature);
    Ok(())
}
