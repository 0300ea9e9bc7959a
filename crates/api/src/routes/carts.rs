//! Cart CRUD and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use cart::Cart;
use chrono::{DateTime, Utc};
use common::{CartId, CustomerId, LineItem, ProductId};
use saga::{CartCoordinator, FulfillmentPublisher, PaymentGateway};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<P, F>
where
    P: PaymentGateway,
    F: FulfillmentPublisher,
{
    pub coordinator: CartCoordinator<P, F>,
    /// Reports whether the broker connection is up, for `/health`.
    pub broker_connected: Box<dyn Fn() -> bool + Send + Sync>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateCartRequest {
    pub customer_id: String,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(alias = "credential")]
    pub credit_card_number: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart_id: CartId,
    pub customer_id: CustomerId,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            cart_id: cart.id(),
            customer_id: cart.customer_id().clone(),
            items: cart.items().to_vec(),
            created_at: cart.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub status: &'static str,
    pub transaction_id: String,
    /// Charged amount in dollars.
    pub total: f64,
}

// -- Handlers --

/// POST /create: create an empty cart for a customer.
#[tracing::instrument(skip(state, payload))]
pub async fn create<P, F>(
    State(state): State<Arc<AppState<P, F>>>,
    payload: Result<Json<CreateCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError>
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let Json(req) = payload.map_err(bad_body)?;
    let customer_id = req.customer_id.trim();
    if customer_id.is_empty() {
        return Err(ApiError::BadRequest("customer_id is required".to_string()));
    }

    let cart = state
        .coordinator
        .create_cart(CustomerId::new(customer_id))
        .await;

    Ok((StatusCode::CREATED, Json(cart.into())))
}

/// GET /cart/{id}: load a cart.
#[tracing::instrument(skip(state))]
pub async fn get<P, F>(
    State(state): State<Arc<AppState<P, F>>>,
    Path(id): Path<String>,
) -> Result<Json<CartResponse>, ApiError>
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let cart_id = parse_cart_id(&id)?;
    let cart = state.coordinator.get_cart(cart_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/{id}/items: add units of a product, merging with an existing line.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<P, F>(
    State(state): State<Arc<AppState<P, F>>>,
    Path(id): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError>
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let cart_id = parse_cart_id(&id)?;
    let Json(req) = payload.map_err(bad_body)?;
    if req.product_id.trim().is_empty() {
        return Err(ApiError::BadRequest("product_id is required".to_string()));
    }

    let cart = state
        .coordinator
        .add_item(cart_id, ProductId::new(req.product_id.trim()), req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// POST /cart/{id}/checkout: run the checkout saga.
#[tracing::instrument(skip(state, payload))]
pub async fn checkout<P, F>(
    State(state): State<Arc<AppState<P, F>>>,
    Path(id): Path<String>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError>
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let cart_id = parse_cart_id(&id)?;
    let Json(req) = payload.map_err(bad_body)?;
    if req.credit_card_number.is_empty() {
        return Err(ApiError::BadRequest(
            "credit_card_number is required".to_string(),
        ));
    }

    let receipt = state
        .coordinator
        .checkout(cart_id, &req.credit_card_number)
        .await?;

    Ok(Json(CheckoutResponse {
        order_id: receipt.order_id,
        status: "Authorized",
        transaction_id: receipt.transaction_id,
        total: receipt.total.as_decimal(),
    }))
}

/// Ids that are not UUIDs can never name a cart, so they are reported as missing.
fn parse_cart_id(id: &str) -> Result<CartId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::NotFound(format!("Cart not found: {id}")))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
}
