mod common;

use common::*;
use std::net::{IpAddr, Ipv4Addr};

use wxpay_backend::payments::providers::wxpay::sign::{generate_signature, SignType};
use wxpay_backend::payments::providers::wxpay::xml::from_xml;
use wxpay_backend::{NotifyRejection, NotifyResult, Order, PaymentResult, WxPayConfig, WxPayError};

fn order() -> Order {
    Order::new("O1", "Widget", "CNY", "100")
}

fn client_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(198, 51, 100, 23))
}

#[tokio::test]
async fn test_native_pay_success_returns_code_url() {
    let (service, gateway) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("return_msg", "OK"),
        ("result_code", "SUCCESS"),
        ("prepay_id", "wx201410272009395522657a690389285100"),
        ("code_url", "weixin://wxpay/bizpayurl?pr=8yx2kd1"),
    ])))
    .await;

    let result = service.native_pay(&order(), client_ip()).await;
    assert_eq!(
        result.success().map(|p| p.code_url.as_str()),
        Some("weixin://wxpay/bizpayurl?pr=8yx2kd1")
    );
    assert!(result.error_message().is_none());

    let sent = gateway.last_call().expect("gateway called");
    assert_eq!(sent.get("trade_type").map(String::as_str), Some("NATIVE"));
    assert_eq!(sent.get("out_trade_no").map(String::as_str), Some("O1"));
    assert_eq!(sent.get("spbill_create_ip").map(String::as_str), Some("198.51.100.23"));
    assert_eq!(sent.get("notify_url").map(String::as_str), Some(NOTIFY_URL));
    assert!(!sent.contains_key("openid"));
}

#[tokio::test]
async fn test_native_pay_return_code_failure_uses_return_msg() {
    let (service, _) = service(Reply::Fields(fields(&[
        ("return_code", "FAIL"),
        ("return_msg", "invalid mch_id"),
    ])))
    .await;

    let result = service.native_pay(&order(), client_ip()).await;
    assert_eq!(
        result,
        PaymentResult::Failure {
            code: None,
            message: "invalid mch_id".to_string()
        }
    );
    assert!(result.success().is_none());
}

#[tokio::test]
async fn test_native_pay_business_failure_carries_err_code() {
    let (service, _) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("result_code", "FAIL"),
        ("err_code", "ORDERPAID"),
        ("err_code_des", "order already paid"),
    ])))
    .await;

    let result = service.native_pay(&order(), client_ip()).await;
    assert_eq!(result.error_code(), Some("ORDERPAID"));
    assert_eq!(result.error_message(), Some("order already paid"));
}

#[tokio::test]
async fn test_native_pay_transport_error_becomes_failure() {
    let (service, _) = service(Reply::Timeout).await;

    let result = service.native_pay(&order(), client_ip()).await;
    assert!(!result.is_success());
    assert_eq!(
        result.error_message(),
        Some(WxPayError::Timeout.to_string().as_str())
    );
}

#[tokio::test]
async fn test_native_pay_without_code_url_fails() {
    let (service, _) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("result_code", "SUCCESS"),
    ])))
    .await;

    let result = service.native_pay(&order(), client_ip()).await;
    assert!(!result.is_success());
    assert!(!result.error_message().unwrap_or("").is_empty());
}

#[tokio::test]
async fn test_jsapi_pay_signs_client_parameters() {
    let (service, gateway) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("result_code", "SUCCESS"),
        ("nonce_str", "IITRi8Iabbblz1Jc"),
        ("prepay_id", "wx201410272009395522657a690389285100"),
    ])))
    .await;

    let result = service
        .jsapi_pay(&order(), "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o", client_ip())
        .await;
    let params = result.success().expect("jsapi payment should succeed").clone();

    assert_eq!(params.app_id, APP_ID);
    assert_eq!(params.nonce_str, "IITRi8Iabbblz1Jc");
    assert_eq!(params.prepay_id, "wx201410272009395522657a690389285100");
    assert_eq!(params.package, "prepay_id=wx201410272009395522657a690389285100");
    assert_eq!(params.sign_type, "MD5");
    assert!(params.time_stamp.parse::<i64>().is_ok());

    let expected = generate_signature(
        &fields(&[
            ("appId", APP_ID),
            ("timeStamp", params.time_stamp.as_str()),
            ("nonceStr", params.nonce_str.as_str()),
            ("package", params.package.as_str()),
            ("signType", "MD5"),
        ]),
        KEY,
        SignType::Md5,
    )
    .unwrap();
    assert_eq!(params.pay_sign, expected);

    let sent = gateway.last_call().expect("gateway called");
    assert_eq!(sent.get("trade_type").map(String::as_str), Some("JSAPI"));
    assert_eq!(
        sent.get("openid").map(String::as_str),
        Some("oUpF8uMuAJO_M2pxb1Q9zNjWeS6o")
    );
}

#[tokio::test]
async fn test_jsapi_pay_transport_error_is_generic_failure() {
    let (service, _) = service(Reply::Timeout).await;

    let result = service.jsapi_pay(&order(), "openid", client_ip()).await;
    assert!(result.success().is_none());
    assert_eq!(result.error_message(), Some("payment request failed"));
}

#[tokio::test]
async fn test_jsapi_pay_missing_prepay_id_returns_no_bundle() {
    let (service, _) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("result_code", "SUCCESS"),
        ("nonce_str", "IITRi8Iabbblz1Jc"),
    ])))
    .await;

    let result = service.jsapi_pay(&order(), "openid", client_ip()).await;
    assert!(result.success().is_none());
}

#[tokio::test]
async fn test_jsapi_pay_provider_rejection_keeps_message() {
    let (service, _) = service(Reply::Fields(fields(&[
        ("return_code", "SUCCESS"),
        ("result_code", "FAIL"),
        ("err_code", "NOAUTH"),
        ("err_code_des", "merchant has no permission"),
    ])))
    .await;

    let result = service.jsapi_pay(&order(), "openid", client_ip()).await;
    assert_eq!(result.error_code(), Some("NOAUTH"));
}

#[tokio::test]
async fn test_notification_accepted() {
    let (service, _) = service(Reply::Timeout).await;

    let result = service.handle_notification(&signed_notification(&[], KEY));
    assert!(result.is_success());
    assert_eq!(result.order_id(), Some("O123"));
    assert!(result.error_message().is_none());

    let ack = from_xml(result.ack_body().expect("ack body")).unwrap();
    assert_eq!(ack, fields(&[("return_code", "SUCCESS"), ("return_msg", "OK")]));

    match result {
        NotifyResult::Accepted { fields, .. } => {
            assert_eq!(
                fields.get("transaction_id").map(String::as_str),
                Some("1004400740201409030005092168")
            );
        }
        NotifyResult::Rejected { .. } => unreachable!(),
    }
}

#[tokio::test]
async fn test_notification_with_hmac_sign_type_accepted() {
    use wxpay_backend::payments::providers::wxpay::sign::sign_payload;
    use wxpay_backend::payments::providers::wxpay::xml::to_xml;

    let (service, _) = service(Reply::Timeout).await;
    let mut data = from_xml(&signed_notification(&[], KEY)).unwrap();
    data.remove("sign");
    data.insert("sign_type".to_string(), "HMAC-SHA256".to_string());
    sign_payload(&mut data, KEY, SignType::HmacSha256).unwrap();

    let result = service.handle_notification(&to_xml(&data).unwrap());
    assert_eq!(result.order_id(), Some("O123"));
}

#[tokio::test]
async fn test_tampered_notification_rejected() {
    let (service, _) = service(Reply::Timeout).await;
    let body = signed_notification(&[], KEY).replace("<total_fee>100<", "<total_fee>1<");

    let result = service.handle_notification(&body);
    assert_eq!(
        result,
        NotifyResult::Rejected {
            reason: NotifyRejection::SignatureInvalid
        }
    );
    assert_eq!(result.order_id(), None);
    assert_eq!(result.ack_body(), None);
    assert_eq!(result.error_message().as_deref(), Some("signature invalid"));
}

#[tokio::test]
async fn test_notification_signed_with_wrong_key_rejected() {
    let (service, _) = service(Reply::Timeout).await;
    let result = service.handle_notification(&signed_notification(&[], "not-the-merchant-key"));
    assert_eq!(result.error_message().as_deref(), Some("signature invalid"));
}

#[tokio::test]
async fn test_notification_identity_mismatches_are_distinct() {
    let (service, _) = service(Reply::Timeout).await;

    let wrong_mch = service.handle_notification(&signed_notification(&[("mch_id", "1900000999")], KEY));
    assert_eq!(wrong_mch.error_message().as_deref(), Some("merchant id mismatch"));
    assert_eq!(wrong_mch.order_id(), None);

    let wrong_app = service.handle_notification(&signed_notification(&[("appid", "wx0000000000000000")], KEY));
    assert_eq!(wrong_app.error_message().as_deref(), Some("app id mismatch"));
    assert_eq!(wrong_app.ack_body(), None);
}

#[tokio::test]
async fn test_notification_malformed_body_rejected() {
    let (service, _) = service(Reply::Timeout).await;

    let result = service.handle_notification("{\"return_code\":\"SUCCESS\"}");
    assert!(matches!(
        result,
        NotifyResult::Rejected {
            reason: NotifyRejection::MalformedBody(_)
        }
    ));
}

#[tokio::test]
async fn test_notification_with_appended_root_rejected() {
    let (service, _) = service(Reply::Timeout).await;

    let truncated = signed_notification(&[], KEY).replace("</xml>", "");
    let appended = format!("{}<xml><attach></attach></xml>", signed_notification(&[], KEY));

    for body in [truncated, appended] {
        assert!(matches!(
            service.handle_notification(&body),
            NotifyResult::Rejected {
                reason: NotifyRejection::MalformedBody(_)
            }
        ));
    }
}

#[tokio::test]
async fn test_notification_without_order_number_rejected() {
    let (service, _) = service(Reply::Timeout).await;

    let result = service.handle_notification(&signed_notification(&[("out_trade_no", "")], KEY));
    assert_eq!(
        result,
        NotifyResult::Rejected {
            reason: NotifyRejection::MissingOrderId
        }
    );
}

#[tokio::test]
async fn test_sandbox_construction_fails_without_sandbox_key() {
    let gateway = MockGateway::new(Reply::Timeout);
    let mut raw = input();
    raw.use_sandbox = true;

    let err = WxPayConfig::build(raw, &gateway).await.unwrap_err();
    assert!(matches!(err, WxPayError::SandboxKey { .. }));
}
