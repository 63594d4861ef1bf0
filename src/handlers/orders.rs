use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    services::orders::{OrderSnapshot, PlaceOrderRequest, UpdateOrderStatusRequest},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CancelQuery {
    /// Free-form cancellation reason; defaults to "Changed mind"
    pub reason: Option<String>,
}

/// Place an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = OrderSnapshot),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse),
        (status = 422, description = "Empty cart or insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<OrderSnapshot> {
    let snapshot = state
        .services
        .orders
        .place_order(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// The caller's order history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Orders returned", body = [OrderSnapshot]),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<OrderSnapshot>> {
    let snapshots = state.services.orders.get_my_orders(user.user_id).await?;
    Ok(Json(ApiResponse::success(snapshots)))
}

/// A single order, restricted to its owner
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order returned", body = OrderSnapshot),
        (status = 403, description = "Order belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderSnapshot> {
    let snapshot = state.services.orders.get_order(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Cancel one of the caller's pending orders
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id"), CancelQuery),
    responses(
        (status = 200, description = "Order cancelled", body = OrderSnapshot),
        (status = 403, description = "Order belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is no longer cancellable", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CancelQuery>,
) -> ApiResult<OrderSnapshot> {
    let snapshot = state
        .services
        .orders
        .user_cancel_order(user.user_id, id, query.reason)
        .await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Admin: apply a lifecycle transition
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderSnapshot),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not permitted", body = crate::errors::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn admin_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderSnapshot> {
    user.require_admin()?;
    let snapshot = state
        .services
        .orders
        .admin_update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Admin: paginated order listing, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(ListQuery),
    responses(
        (status = 200, description = "Orders returned"),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn admin_list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<OrderSnapshot>> {
    user.require_admin()?;
    let (items, total) = state
        .services
        .orders
        .list_orders(query.page, query.limit)
        .await?;
    let total_pages = total.div_ceil(query.limit.max(1));
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: query.page,
        limit: query.limit,
        total_pages,
    })))
}
