use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{header, StatusCode};
use tracing::{info, warn};

use super::AppState;
use crate::payments::providers::wxpay::FAIL;
use crate::payments::service::notify_reply;
use crate::payments::types::NotifyResult;

/// Payment result notification endpoint.
///
/// Always answers 200 with an XML `return_code`/`return_msg` document; a FAIL
/// reply makes the provider deliver the notification again later.
pub async fn wxpay_notify(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = String::from_utf8_lossy(&body);

    let reply = match state.service.handle_notification(&raw) {
        NotifyResult::Accepted { order_id, ack_body, fields } => {
            info!(
                "Order paid: out_trade_no={}, transaction_id={}",
                order_id,
                fields.get("transaction_id").map(String::as_str).unwrap_or("")
            );
            ack_body
        }
        NotifyResult::Rejected { reason } => {
            warn!("Notification rejected: {}", reason);
            notify_reply(FAIL, &reason.to_string())
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        reply,
    )
        .into_response()
}
