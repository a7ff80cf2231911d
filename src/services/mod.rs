pub mod auth_service;
pub mod blog_service;
pub mod order_service;
pub mod product_intake;
pub mod product_service;
pub mod review_service;
