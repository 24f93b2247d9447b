use axum::{
    extract::{ConnectInfo, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

use super::AppState;
use crate::payments::types::{Order, PaymentResult};

fn default_fee_type() -> String {
    "CNY".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub order_id: String,
    pub body: String,
    #[serde(default = "default_fee_type")]
    pub fee_type: String,
    /// Amount in fen
    pub total_fee: String,
}

impl OrderRequest {
    fn into_order(self) -> Order {
        Order::new(self.order_id, self.body, self.fee_type, self.total_fee)
    }
}

#[derive(Debug, Deserialize)]
pub struct JsapiPayRequest {
    #[serde(flatten)]
    pub order: OrderRequest,
    pub openid: String,
}

/// Originating address of the payer's request.
///
/// Proxy headers win over the socket peer, which is only the last hop.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

fn bad_request(message: impl Into<String>) -> Response {
    let body: PaymentResult<()> = PaymentResult::failure(None, message);
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn payment_response<T: Serialize>(result: PaymentResult<T>) -> Response {
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(result)).into_response()
}

fn prepare(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: OrderRequest,
) -> Result<(Order, IpAddr), Response> {
    let Some(ip) = client_ip(headers, connect_info.map(|ConnectInfo(addr)| addr)) else {
        warn!("Payment request without a usable client address");
        return Err(bad_request("unable to determine client ip"));
    };

    let order = request.into_order();
    order.validate().map_err(|message| bad_request(message))?;
    Ok((order, ip))
}

pub async fn native_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<OrderRequest>,
) -> Response {
    let (order, ip) = match prepare(&headers, connect_info, request) {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    payment_response(state.service.native_pay(&order, ip).await)
}

pub async fn jsapi_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<JsapiPayRequest>,
) -> Response {
    if request.openid.trim().is_empty() {
        return bad_request("openid cannot be empty");
    }
    let openid = request.openid;
    let (order, ip) = match prepare(&headers, connect_info, request.order) {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    payment_response(state.service.jsapi_pay(&order, &openid, ip).await)
}
