use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    services::carts::{AddToCartRequest, CartView},
    ApiResponse, ApiResult, AppState,
};

/// The caller's cart with computed totals
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart view returned", body = CartView),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartView> {
    let view = state.services.carts.get_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Add a variant to the cart (merges into an existing line)
#[utoipa::path(
    post,
    path = "/api/v1/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added, updated cart returned", body = CartView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddToCartRequest>,
) -> ApiResult<CartView> {
    let view = state.services.carts.add_item(user.user_id, request).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Remove a line from the caller's cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/remove/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 403, description = "Item belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<String> {
    state
        .services
        .carts
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(Json(ApiResponse::success("Item removed".to_string())))
}
