use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, SignupRequest},
        blogs::{BlogList, BlogMultipartForm, BlogResponse},
        orders::{
            CreateOrderRequest, LineItemInput, OrderItemResponse, OrderList, OrderResponse,
            PayOrderRequest, ShippingAddressInput, UpdateOrderStatusRequest,
        },
        products::{ProductList, ProductMultipartForm, ProductResponse},
        reviews::{CreateReviewRequest, RatingStats, ReviewList, ReviewResponse, UpdateReviewRequest},
    },
    models::{OrderStatus, PaymentMethod, PaymentResult, ShippingAddress, User},
    response::{ApiResponse, Meta},
    routes::{auth, blogs, health, orders, params, products, reviews},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::me,
        products::list_products,
        products::shop_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_orders,
        orders::my_orders,
        orders::orders_by_status,
        orders::get_order,
        orders::pay_order,
        orders::update_order_status,
        orders::cancel_order,
        reviews::create_review,
        reviews::product_reviews,
        reviews::user_reviews,
        reviews::review_stats,
        reviews::get_review,
        reviews::update_review,
        reviews::delete_review,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::create_blog,
        blogs::update_blog,
        blogs::delete_blog
    ),
    components(
        schemas(
            User,
            SignupRequest,
            LoginRequest,
            AuthResponse,
            ProductResponse,
            ProductList,
            ProductMultipartForm,
            OrderStatus,
            PaymentMethod,
            PaymentResult,
            ShippingAddress,
            CreateOrderRequest,
            LineItemInput,
            ShippingAddressInput,
            UpdateOrderStatusRequest,
            PayOrderRequest,
            OrderItemResponse,
            OrderResponse,
            OrderList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewResponse,
            ReviewList,
            RatingStats,
            BlogResponse,
            BlogList,
            BlogMultipartForm,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::MyOrdersQuery,
            params::BlogQuery,
            Meta,
            ApiResponse<ProductResponse>,
            ApiResponse<ProductList>,
            ApiResponse<OrderResponse>,
            ApiResponse<OrderList>,
            ApiResponse<ReviewResponse>,
            ApiResponse<RatingStats>,
            ApiResponse<BlogResponse>,
            ApiResponse<AuthResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Blogs", description = "Blog endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
