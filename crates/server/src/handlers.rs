//! Request handlers. Each one normalizes its input, calls exactly one
//! service operation and maps the outcome to a response.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use model::{
    CartItemId, CategoryId, OrderId, PlaceOrder, ProductId, StatusUpdate, SubcategoryId,
    request::{AddToCartBody, CreateOrderBody, StatusUpdateBody, UpdateCartBody, normalize_size},
};
use serde::Deserialize;
use serde_json::json;
use service::CascadeReport;
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::{ApiError, ApiResponse};
use crate::extract::CurrentCaller;

type ApiResult = Result<Response, ApiError>;

pub(crate) async fn create_order(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    body: Result<Json<CreateOrderBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let order = PlaceOrder::from(body);
    info!(user_id = caller.user_id, lines = order.items.len(), "Received order");

    match state.orders.create_order(caller.user_id, order).await {
        Ok(order_id) => {
            state.metrics.record_order_created();
            let body = ApiResponse {
                order_id: Some(order_id),
                ..ApiResponse::ok("Order placed successfully")
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        Err(e) => {
            state.metrics.record_order_failure(e.reason());
            Err(e.into())
        }
    }
}

pub(crate) async fn list_user_orders(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
) -> ApiResult {
    let orders = state.orders.list_user_orders(caller.user_id).await?;
    Ok(Json(orders).into_response())
}

pub(crate) async fn get_order(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<OrderId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let order = state.orders.get_order(caller, id).await?;
    Ok(Json(order).into_response())
}

pub(crate) async fn delete_order(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<OrderId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.orders.delete_order(caller, id).await?;
    Ok(Json(ApiResponse::ok("Order deleted")).into_response())
}

pub(crate) async fn list_all_orders(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
) -> ApiResult {
    let orders = state.orders.list_all_orders(caller).await?;
    Ok(Json(orders).into_response())
}

pub(crate) async fn update_order_status(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<OrderId>, PathRejection>,
    body: Result<Json<StatusUpdateBody>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(body) = body?;
    // Admin rights are checked before the body's status is interpreted.
    caller.require_admin()?;
    let update = StatusUpdate::try_from(body)?;
    let order = state.orders.update_status(caller, id, update).await?;
    Ok(Json(order).into_response())
}

pub(crate) async fn view_cart(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
) -> ApiResult {
    let cart = state.cart.view_cart(caller.user_id).await?;
    Ok(Json(cart).into_response())
}

pub(crate) async fn add_to_cart(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    body: Result<Json<AddToCartBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let item = state
        .cart
        .add_item(
            caller.user_id,
            body.product_id,
            normalize_size(body.selected_size),
            body.quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub(crate) async fn update_cart_item(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<CartItemId>, PathRejection>,
    body: Result<Json<UpdateCartBody>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(body) = body?;
    state
        .cart
        .update_quantity(caller.user_id, id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok("Cart updated")).into_response())
}

pub(crate) async fn remove_cart_item(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<CartItemId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.cart.remove_item(caller.user_id, id).await?;
    Ok(Json(ApiResponse::ok("Item removed from cart")).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriceQuery {
    size: Option<String>,
}

pub(crate) async fn quote_product(
    State(state): State<AppState>,
    id: Result<Path<ProductId>, PathRejection>,
    query: Result<Query<PriceQuery>, QueryRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Query(query) = query?;
    let quote = state
        .catalog
        .quote_product(id, normalize_size(query.size))
        .await?;
    Ok(Json(quote).into_response())
}

fn removed(report: CascadeReport) -> Response {
    Json(json!({ "success": true, "removed": report })).into_response()
}

pub(crate) async fn delete_category(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<CategoryId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    caller.require_admin()?;
    let report = state.catalog.delete_category(id).await?;
    Ok(removed(report))
}

pub(crate) async fn delete_subcategory(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<SubcategoryId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    caller.require_admin()?;
    let report = state.catalog.delete_subcategory(id).await?;
    Ok(removed(report))
}

pub(crate) async fn delete_product(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    id: Result<Path<ProductId>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    caller.require_admin()?;
    let report = state.catalog.delete_product(id).await?;
    Ok(removed(report))
}

pub(crate) async fn health() -> &'static str {
    "OK"
}

pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

pub(crate) async fn not_found(uri: axum::http::Uri) -> Response {
    warn!("No route for {}", uri.path());
    (StatusCode::NOT_FOUND, Json(ApiResponse::failure("route not found"))).into_response()
}
