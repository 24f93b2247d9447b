//! HTTP surface: health, payment initiation and provider notifications

pub mod health;
pub mod payments;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::payments::service::WxPayService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WxPayService>,
    pub environment: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments/native", post(payments::native_pay))
        .route("/payments/jsapi", post(payments::jsapi_pay))
        .route("/webhooks/wxpay", post(webhooks::wxpay_notify))
        .with_state(state)
}
