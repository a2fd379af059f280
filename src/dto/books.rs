use serde::Serialize;
use utoipa::ToSchema;

use crate::models::BookSummary;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct BookList {
    #[schema(value_type = Vec<BookSummary>)]
    pub items: Vec<BookSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomeBooks {
    pub new_books: Vec<BookSummary>,
    pub classic_books: Vec<BookSummary>,
    pub discount_books: Vec<BookSummary>,
    pub popular_books: Vec<BookSummary>,
}
