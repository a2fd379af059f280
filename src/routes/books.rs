use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::books::{BookList, HomeBooks},
    error::AppResult,
    models::Book,
    response::ApiResponse,
    routes::params::{BookQuery, Pagination},
    services::book_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books))
        .route("/new", get(new_books))
        .route("/classic", get(classic_books))
        .route("/discount", get(discount_books))
        .route("/popular", get(popular_books))
        .route("/home", get(home))
        .route("/{id}", get(get_book))
        .route("/{id}/related", get(related_books))
}

#[utoipa::path(
    get,
    path = "/api/books",
    params(BookQuery),
    responses(
        (status = 200, description = "Filtered, sorted and paginated catalog", body = ApiResponse<BookList>),
        (status = 400, description = "Invalid filter or pagination"),
    ),
    tag = "Books"
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::list_books(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/new",
    params(Pagination),
    responses(
        (status = 200, description = "Books published this year", body = ApiResponse<BookList>)
    ),
    tag = "Books"
)]
pub async fn new_books(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::new_books(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/classic",
    params(Pagination),
    responses(
        (status = 200, description = "Classic literature", body = ApiResponse<BookList>)
    ),
    tag = "Books"
)]
pub async fn classic_books(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::classic_books(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/discount",
    params(Pagination),
    responses(
        (status = 200, description = "Biggest discounts first", body = ApiResponse<BookList>)
    ),
    tag = "Books"
)]
pub async fn discount_books(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::discount_books(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/popular",
    params(Pagination),
    responses(
        (status = 200, description = "Popular books", body = ApiResponse<BookList>)
    ),
    tag = "Books"
)]
pub async fn popular_books(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::popular_books(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/home",
    responses(
        (status = 200, description = "First page of every home-page section", body = ApiResponse<HomeBooks>)
    ),
    tag = "Books"
)]
pub async fn home(State(state): State<AppState>) -> AppResult<Json<ApiResponse<HomeBooks>>> {
    let resp = book_service::home(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book detail", body = ApiResponse<Book>),
        (status = 404, description = "Book not found"),
    ),
    tag = "Books"
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Book>>> {
    let resp = book_service::get_book(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}/related",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Same genre, same author and same year", body = ApiResponse<BookList>),
        (status = 404, description = "Book not found"),
    ),
    tag = "Books"
)]
pub async fn related_books(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let resp = book_service::related_books(&state, id).await?;
    Ok(Json(resp))
}
