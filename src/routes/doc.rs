use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        books::{BookList, HomeBooks},
        cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
        checkout::{PreviewOrderRequest, SubmitOrderRequest, SubmitOrderResponse},
        orders::OrderList,
    },
    middleware::session::SESSION_COOKIE_NAME,
    models::{Book, BookSummary, CartItem, CartLine, Order, OrderItem, OrderSummary, PaymentMethod, User},
    response::{ApiResponse, Meta},
    routes::{auth, books, cart, checkout, health, orders, params},
    shipping::{District, PreviewInfo, Province, Ward},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE_NAME))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        books::list_books,
        books::new_books,
        books::classic_books,
        books::discount_books,
        books::popular_books,
        books::home,
        books::get_book,
        books::related_books,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        checkout::provinces,
        checkout::districts,
        checkout::wards,
        checkout::preview_order,
        checkout::submit_order,
        orders::list_orders,
        orders::get_order
    ),
    components(
        schemas(
            User,
            Book,
            BookSummary,
            CartItem,
            CartLine,
            Order,
            OrderItem,
            OrderSummary,
            PaymentMethod,
            Province,
            District,
            Ward,
            PreviewInfo,
            RegisterRequest,
            LoginRequest,
            AddToCartRequest,
            UpdateCartItemRequest,
            PreviewOrderRequest,
            SubmitOrderRequest,
            SubmitOrderResponse,
            BookList,
            HomeBooks,
            CartView,
            OrderList,
            params::Pagination,
            params::BookQuery,
            params::BookSort,
            Meta,
            ApiResponse<Book>,
            ApiResponse<BookList>,
            ApiResponse<HomeBooks>,
            ApiResponse<CartView>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            ApiResponse<SubmitOrderResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Session authentication endpoints"),
        (name = "Books", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Shipping lookup and order placement"),
        (name = "Orders", description = "Order history endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
