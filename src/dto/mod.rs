pub mod auth;
pub mod blogs;
pub mod orders;
pub mod products;
pub mod reviews;
