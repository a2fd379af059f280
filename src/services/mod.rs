pub mod auth_service;
pub mod book_service;
pub mod cart_service;
pub mod checkout_service;
pub mod import_service;
pub mod order_service;
