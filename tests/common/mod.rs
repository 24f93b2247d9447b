#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use wxpay_backend::payments::providers::wxpay::sign::{sign_payload, SignType};
use wxpay_backend::payments::providers::wxpay::xml::to_xml;
use wxpay_backend::{
    PayloadMap, PaymentGateway, WxPayConfig, WxPayConfigInput, WxPayError, WxPayResult,
    WxPayService,
};

pub const APP_ID: &str = "wx2421b1c4370ec43b";
pub const MCH_ID: &str = "1900000109";
pub const KEY: &str = "192006250b4c09247ec02edce69f6a2d";
pub const NOTIFY_URL: &str = "https://merchant.example.com/webhooks/wxpay";

pub enum Reply {
    Fields(PayloadMap),
    Timeout,
}

/// Gateway returning a canned reply and recording what it was sent
pub struct MockGateway {
    reply: Reply,
    pub calls: Mutex<Vec<PayloadMap>>,
}

impl MockGateway {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> Option<PayloadMap> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn unified_order(
        &self,
        _config: &WxPayConfig,
        payload: PayloadMap,
    ) -> WxPayResult<PayloadMap> {
        self.calls.lock().unwrap().push(payload);
        match &self.reply {
            Reply::Fields(fields) => Ok(fields.clone()),
            Reply::Timeout => Err(WxPayError::Timeout),
        }
    }

    async fn fetch_sandbox_sign_key(&self, _mch_id: &str, _key: &str) -> WxPayResult<String> {
        Err(WxPayError::network("sandbox is not reachable from tests"))
    }
}

pub fn fields(pairs: &[(&str, &str)]) -> PayloadMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn input() -> WxPayConfigInput {
    WxPayConfigInput::new(APP_ID, MCH_ID, KEY, NOTIFY_URL)
}

pub async fn service(reply: Reply) -> (WxPayService, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::new(reply));
    let config = WxPayConfig::build(input(), &*gateway)
        .await
        .expect("config should build");
    (WxPayService::new(config, gateway.clone()), gateway)
}

/// Payment notification as the provider would send it, signed with `key`
pub fn signed_notification(overrides: &[(&str, &str)], key: &str) -> String {
    let mut data = fields(&[
        ("appid", APP_ID),
        ("mch_id", MCH_ID),
        ("nonce_str", "5d2b6c2a8db53831f7eda20af46e531c"),
        ("result_code", "SUCCESS"),
        ("return_code", "SUCCESS"),
        ("openid", "oUpF8uMEb4qRXf22hE3X68TekukE"),
        ("out_trade_no", "O123"),
        ("total_fee", "100"),
        ("fee_type", "CNY"),
        ("trade_type", "JSAPI"),
        ("transaction_id", "1004400740201409030005092168"),
        ("time_end", "20140903131540"),
    ]);
    for (k, v) in overrides {
        data.insert(k.to_string(), v.to_string());
    }
    sign_payload(&mut data, key, SignType::Md5).expect("sign");
    to_xml(&data).expect("xml")
}
