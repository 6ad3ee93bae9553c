use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Checkout, payment reconciliation and back-office endpoints for the storefront.

## Payment flow

1. `POST /checkout/initiate` records a pending order and returns the gateway redirect URL.
2. The gateway calls `POST /webhook/payment`; the service re-fetches the payment and settles the order.
3. Settled orders never move again. Duplicate notifications are acknowledged and ignored.

## Error Handling

Errors share one body:

```json
{
  "error": "Bad Request",
  "message": "Validation error: cart is empty",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Hosted checkout initiation"),
        (name = "Payments", description = "Gateway notifications"),
        (name = "Orders", description = "Order lookup and history"),
        (name = "Carts", description = "Device and user carts"),
        (name = "Products", description = "Catalog lookup"),
        (name = "Admin", description = "Order oversight and catalog pricing"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::health::health_check,

        // Checkout & payments
        crate::handlers::checkout::initiate_checkout,
        crate::handlers::payment_webhooks::payment_webhook,

        // Orders
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_user_orders,

        // Carts
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::set_item_quantity,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::merge_carts,

        // Catalog & admin
        crate::handlers::admin::get_product,
        crate::handlers::admin::list_orders,
        crate::handlers::admin::update_fulfillment,
        crate::handlers::admin::cancel_order,
        crate::handlers::admin::apply_discount,
        crate::handlers::admin::restore_prices,
        crate::handlers::admin::upsert_product,
        crate::handlers::admin::set_product_active,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::models::OrderRecord,
            crate::models::OrderItem,
            crate::models::OrderStatus,
            crate::models::FulfillmentStatus,
            crate::models::OrderOrigin,
            crate::models::Product,
            crate::models::CartLine,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
