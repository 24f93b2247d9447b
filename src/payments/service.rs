//! Payment flows on top of a `PaymentGateway`

use quick_xml::escape::escape;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::WxPayResult;
use crate::payments::providers::wxpay::config::{WxPayConfig, WxPayConfigInput};
use crate::payments::providers::wxpay::sign::{
    generate_signature, is_signature_valid, SignType, FIELD_SIGN_TYPE,
};
use crate::payments::providers::wxpay::xml::{from_xml, to_xml};
use crate::payments::providers::wxpay::{
    WxPayClient, FIELD_ERR_CODE, FIELD_ERR_CODE_DES, FIELD_RESULT_CODE, FIELD_RETURN_CODE,
    FIELD_RETURN_MSG, SUCCESS,
};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{
    JsapiPayParams, NativePayment, NotifyRejection, NotifyResult, Order, PaymentResult,
    PayloadMap, TradeType,
};

/// Unified order business fields for `order`.
///
/// Pure: the same inputs always give the same map.
pub fn unified_order_payload(
    order: &Order,
    trade_type: TradeType,
    client_ip: IpAddr,
    notify_url: &str,
) -> PayloadMap {
    let mut data = PayloadMap::new();
    data.insert("body".to_string(), order.body.clone());
    data.insert("out_trade_no".to_string(), order.id.clone());
    data.insert("device_info".to_string(), String::new());
    data.insert("fee_type".to_string(), order.fee_type.clone());
    data.insert("total_fee".to_string(), order.total_fee.clone());
    data.insert("spbill_create_ip".to_string(), client_ip.to_string());
    data.insert("notify_url".to_string(), notify_url.to_string());
    data.insert("trade_type".to_string(), trade_type.as_str().to_string());
    data.insert("product_id".to_string(), order.id.clone());
    data
}

/// Acknowledgment the provider expects after a handled notification
pub fn notify_reply(return_code: &str, return_msg: &str) -> String {
    let mut reply = PayloadMap::new();
    reply.insert(FIELD_RETURN_CODE.to_string(), return_code.to_string());
    reply.insert(FIELD_RETURN_MSG.to_string(), return_msg.to_string());
    to_xml(&reply).unwrap_or_else(|e| {
        error!("Failed to encode notification reply: {}", e);
        plain_reply(return_code, return_msg)
    })
}

fn plain_reply(return_code: &str, return_msg: &str) -> String {
    format!(
        "<xml><return_code>{}</return_code><return_msg>{}</return_msg></xml>",
        escape(return_code),
        escape(return_msg)
    )
}

fn field<'a>(data: &'a PayloadMap, name: &str) -> &'a str {
    data.get(name).map(String::as_str).unwrap_or("")
}

fn is_success_code(data: &PayloadMap, name: &str) -> bool {
    field(data, name).trim().eq_ignore_ascii_case(SUCCESS)
}

/// WeChat Pay flows: QR code payment, mini program payment and notifications.
pub struct WxPayService {
    config: Arc<WxPayConfig>,
    gateway: Arc<dyn PaymentGateway>,
}

impl WxPayService {
    pub fn new(config: WxPayConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            config: Arc::new(config),
            gateway,
        }
    }

    /// Build the HTTP client and freeze the configuration.
    ///
    /// Fails when the configuration is incomplete or, in sandbox mode, when no
    /// sandbox key can be obtained.
    pub async fn connect(input: WxPayConfigInput) -> WxPayResult<Self> {
        let client = WxPayClient::new(&input)?;
        let config = WxPayConfig::build(input, &client).await?;
        info!(
            "WeChat Pay service ready: app_id={}, mch_id={}, sandbox={}, report_workers={}",
            config.app_id(),
            config.mch_id(),
            config.use_sandbox(),
            config.report().worker_num
        );
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &WxPayConfig {
        &self.config
    }

    pub fn build_unified_order_payload(
        &self,
        order: &Order,
        trade_type: TradeType,
        client_ip: IpAddr,
    ) -> PayloadMap {
        unified_order_payload(order, trade_type, client_ip, self.config.notify_url())
    }

    /// Native (QR code) payment
    ///
    /// Never errors: every problem becomes `PaymentResult::Failure`.
    pub async fn native_pay(&self, order: &Order, client_ip: IpAddr) -> PaymentResult<NativePayment> {
        info!("Initiating native payment: out_trade_no={}", order.id);

        let payload = self.build_unified_order_payload(order, TradeType::Native, client_ip);
        let response = match self.gateway.unified_order(&self.config, payload).await {
            Ok(response) => response,
            Err(e) => {
                error!("Native unified order failed: out_trade_no={}, error={}", order.id, e);
                return PaymentResult::failure(None, e.to_string());
            }
        };

        if let Some(failure) = Self::protocol_failure(&order.id, &response) {
            return failure;
        }

        let code_url = field(&response, "code_url");
        if code_url.is_empty() {
            warn!("Native unified order returned no code_url: out_trade_no={}", order.id);
            return PaymentResult::failure(None, "provider returned no code_url");
        }

        info!("Native payment created: out_trade_no={}", order.id);
        PaymentResult::Success(NativePayment {
            code_url: code_url.to_string(),
        })
    }

    /// JSAPI (mini program) payment
    ///
    /// On success returns the parameters the client passes to the payment
    /// sheet, re-signed with MD5 as the client API requires.
    pub async fn jsapi_pay(
        &self,
        order: &Order,
        open_id: &str,
        client_ip: IpAddr,
    ) -> PaymentResult<JsapiPayParams> {
        info!("Initiating JSAPI payment: out_trade_no={}", order.id);

        let mut payload = self.build_unified_order_payload(order, TradeType::Jsapi, client_ip);
        payload.insert("openid".to_string(), open_id.to_string());

        let response = match self.gateway.unified_order(&self.config, payload).await {
            Ok(response) => response,
            Err(e) => {
                error!("JSAPI unified order failed: out_trade_no={}, error={}", order.id, e);
                return PaymentResult::generic_failure();
            }
        };

        if let Some(failure) = Self::protocol_failure(&order.id, &response) {
            return failure;
        }

        let prepay_id = field(&response, "prepay_id");
        let nonce_str = field(&response, "nonce_str");
        if prepay_id.is_empty() || nonce_str.is_empty() {
            warn!(
                "JSAPI unified order response incomplete: out_trade_no={}",
                order.id
            );
            return PaymentResult::generic_failure();
        }

        let time_stamp = chrono::Utc::now().timestamp().to_string();
        match self.client_pay_params(prepay_id, nonce_str, time_stamp) {
            Ok(params) => {
                info!("JSAPI payment created: out_trade_no={}", order.id);
                PaymentResult::Success(params)
            }
            Err(e) => {
                error!("Failed to sign JSAPI parameters: out_trade_no={}, error={}", order.id, e);
                PaymentResult::generic_failure()
            }
        }
    }

    fn client_pay_params(
        &self,
        prepay_id: &str,
        nonce_str: &str,
        time_stamp: String,
    ) -> WxPayResult<JsapiPayParams> {
        let package = format!("prepay_id={}", prepay_id);
        let sign_type = SignType::Md5.to_string();

        let mut sign_data = PayloadMap::new();
        sign_data.insert("appId".to_string(), self.config.app_id().to_string());
        sign_data.insert("timeStamp".to_string(), time_stamp.clone());
        sign_data.insert("nonceStr".to_string(), nonce_str.to_string());
        sign_data.insert("package".to_string(), package.clone());
        sign_data.insert("signType".to_string(), sign_type.clone());
        let pay_sign = generate_signature(&sign_data, self.config.key(), SignType::Md5)?;

        Ok(JsapiPayParams {
            app_id: self.config.app_id().to_string(),
            time_stamp,
            nonce_str: nonce_str.to_string(),
            package,
            prepay_id: prepay_id.to_string(),
            sign_type,
            pay_sign,
        })
    }

    fn protocol_failure<T>(order_id: &str, response: &PayloadMap) -> Option<PaymentResult<T>> {
        if !is_success_code(response, FIELD_RETURN_CODE) {
            let message = field(response, FIELD_RETURN_MSG);
            warn!(
                "Unified order rejected: out_trade_no={}, return_msg={}",
                order_id, message
            );
            return Some(PaymentResult::failure(None, message));
        }

        if !is_success_code(response, FIELD_RESULT_CODE) {
            let code = field(response, FIELD_ERR_CODE);
            let message = field(response, FIELD_ERR_CODE_DES);
            warn!(
                "Unified order business failure: out_trade_no={}, err_code={}, err_code_des={}",
                order_id, code, message
            );
            return Some(PaymentResult::failure(Some(code.to_string()), message));
        }

        None
    }

    /// Validate a payment result notification.
    ///
    /// Checks run in order and the first failure wins: XML body, signature,
    /// merchant id, app id, order number. The caller replies to the provider
    /// whatever the outcome.
    pub fn handle_notification(&self, raw_body: &str) -> NotifyResult {
        let data = match from_xml(raw_body) {
            Ok(data) => data,
            Err(e) => {
                warn!("Rejected notification with unreadable body: {}", e);
                return NotifyResult::rejected(NotifyRejection::MalformedBody(e.to_string()));
            }
        };

        let signature_ok = SignType::from_field(data.get(FIELD_SIGN_TYPE).map(String::as_str))
            .map(|sign_type| is_signature_valid(&data, self.config.key(), sign_type))
            .unwrap_or(false);
        if !signature_ok {
            warn!(
                "Rejected notification with invalid signature: out_trade_no={}",
                field(&data, "out_trade_no")
            );
            return NotifyResult::rejected(NotifyRejection::SignatureInvalid);
        }

        if field(&data, "mch_id") != self.config.mch_id() {
            warn!("Rejected notification for mch_id={}", field(&data, "mch_id"));
            return NotifyResult::rejected(NotifyRejection::MerchantIdMismatch);
        }

        if field(&data, "appid") != self.config.app_id() {
            warn!("Rejected notification for appid={}", field(&data, "appid"));
            return NotifyResult::rejected(NotifyRejection::AppIdMismatch);
        }

        let order_id = field(&data, "out_trade_no").trim().to_string();
        if order_id.is_empty() {
            warn!("Rejected notification without out_trade_no");
            return NotifyResult::rejected(NotifyRejection::MissingOrderId);
        }

        info!(
            "Payment notification accepted: out_trade_no={}, result_code={}",
            order_id,
            field(&data, FIELD_RESULT_CODE)
        );
        NotifyResult::Accepted {
            order_id,
            ack_body: notify_reply(SUCCESS, "OK"),
            fields: data,
        }
    }
}
