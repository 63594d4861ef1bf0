use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::order::{OrderStatus, PaymentMethod};
use crate::errors::ErrorResponse;
use crate::services::carts::{AddToCartRequest, CartItemView, CartView};
use crate::services::orders::{
    OrderItemSnapshot, OrderSnapshot, PlaceOrderRequest, UpdateOrderStatusRequest,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
Cart, inventory reservation, and order lifecycle backend.

All endpoints require a Bearer JWT:

```
Authorization: Bearer <your-jwt-token>
```

Admin endpoints additionally require the `admin` role.
"#
    ),
    paths(
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::remove_from_cart,
        crate::handlers::orders::place_order,
        crate::handlers::orders::get_my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::admin_update_status,
        crate::handlers::orders::admin_list_orders,
    ),
    components(schemas(
        AddToCartRequest,
        CartView,
        CartItemView,
        PlaceOrderRequest,
        UpdateOrderStatusRequest,
        OrderSnapshot,
        OrderItemSnapshot,
        OrderStatus,
        PaymentMethod,
        ErrorResponse,
    )),
    tags(
        (name = "cart", description = "Shopping cart operations"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "admin", description = "Administrative order management")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
