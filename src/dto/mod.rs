pub mod auth;
pub mod books;
pub mod cart;
pub mod checkout;
pub mod orders;
