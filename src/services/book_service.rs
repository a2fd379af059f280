use chrono::{Datelike, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select,
    sea_query::{Expr, LikeExpr, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::books::{BookList, HomeBooks},
    entity::books::{Column, Entity as Books, Model as BookModel},
    error::{AppError, AppResult},
    models::{Book, BookSummary, ImageSize, resize_image},
    response::{ApiResponse, Meta},
    routes::params::{BookFilter, BookQuery, BookSort, Pagination, YearBucket},
    state::AppState,
};

pub const CLASSIC_GENRE: &str = "Văn học kinh điển";

const RELATED_SAME_GENRE: u64 = 5;
const RELATED_SAME_AUTHOR: u64 = 3;
const RELATED_SAME_YEAR: u64 = 3;

/// Escape LIKE wildcards so user input only matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(search: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(search))).escape('\\')
}

/// Translate a validated filter into a WHERE clause.
pub fn filter_condition(filter: &BookFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(search) = &filter.search {
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(contains_pattern(search)))
                .add(Expr::col(Column::Author).ilike(contains_pattern(search))),
        );
    }

    if !filter.genres.is_empty() {
        condition = condition.add(Column::Genre.is_in(filter.genres.iter().cloned()));
    }

    if !filter.years.is_empty() {
        let years = filter
            .years
            .iter()
            .fold(Condition::any(), |any, bucket| match *bucket {
                YearBucket::Exact(year) => any.add(Column::PublicationYear.eq(year)),
                YearBucket::Range(from, to) => {
                    any.add(Column::PublicationYear.between(from, to))
                }
                YearBucket::Before(year) => any.add(Column::PublicationYear.lt(year)),
            });
        condition = condition.add(years);
    }

    if let Some(min_price) = filter.min_price {
        condition = condition.add(Column::CurrentPrice.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        condition = condition.add(Column::CurrentPrice.lte(max_price));
    }

    condition
}

/// Order by the requested field, breaking ties on id so pages stay stable.
pub fn apply_sort(finder: Select<Books>, sort: Option<BookSort>) -> Select<Books> {
    let finder = match sort {
        Some(BookSort::Newest) => finder.order_by_desc(Column::PublicationYear),
        Some(BookSort::Oldest) => finder.order_by_asc(Column::PublicationYear),
        Some(BookSort::PriceAsc) => finder.order_by_asc(Column::CurrentPrice),
        Some(BookSort::PriceDesc) => finder.order_by_desc(Column::CurrentPrice),
        Some(BookSort::Discount) => finder.order_by_desc(Column::DiscountPercent),
        Some(BookSort::Name) => finder.order_by_asc(Column::Name),
        None => finder.order_by_asc(Column::CreatedAt),
    };
    finder.order_by_asc(Column::Id)
}

pub fn catalog_query(filter: &BookFilter) -> Select<Books> {
    let condition = filter_condition(filter);
    let finder = if condition.is_empty() {
        Books::find()
    } else {
        Books::find().filter(condition)
    };
    apply_sort(finder, filter.sort)
}

pub fn book_summary(model: BookModel, size: ImageSize) -> BookSummary {
    BookSummary {
        id: model.id,
        name: model.name,
        image: resize_image(&model.image, size),
        original_price: model.original_price,
        current_price: model.current_price,
        discount_percent: model.discount_percent,
    }
}

pub fn book_detail(model: BookModel) -> Book {
    Book {
        id: model.id,
        image: resize_image(&model.image, ImageSize::Medium),
        name: model.name,
        original_price: model.original_price,
        current_price: model.current_price,
        discount_percent: model.discount_percent,
        isbn: model.isbn,
        genre: model.genre,
        author: model.author,
        publication_year: model.publication_year,
        dimensions: model.dimensions,
        num_pages: model.num_pages,
        cover_type: model.cover_type,
        description: model.description,
    }
}

async fn fetch_page(
    orm: &OrmConn,
    finder: Select<Books>,
    pagination: Pagination,
) -> AppResult<(Vec<BookSummary>, Meta)> {
    let (page, limit, offset) = pagination.validate()?;
    let total = finder.clone().count(orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(orm)
        .await?
        .into_iter()
        .map(|model| book_summary(model, ImageSize::Small))
        .collect();
    Ok((items, Meta::new(page, limit, total)))
}

fn page_response(
    message: &str,
    (items, meta): (Vec<BookSummary>, Meta),
) -> ApiResponse<BookList> {
    ApiResponse::success(message, BookList { items }, Some(meta))
}

pub async fn list_books(state: &AppState, query: BookQuery) -> AppResult<ApiResponse<BookList>> {
    let filter = query.filter()?;
    let page = fetch_page(&state.orm, catalog_query(&filter), query.pagination()).await?;
    Ok(page_response("Books", page))
}

async fn new_page(orm: &OrmConn, pagination: Pagination) -> AppResult<(Vec<BookSummary>, Meta)> {
    let current_year = Utc::now().year();
    let finder = Books::find()
        .filter(Column::PublicationYear.eq(current_year))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id);
    fetch_page(orm, finder, pagination).await
}

async fn classic_page(
    orm: &OrmConn,
    pagination: Pagination,
) -> AppResult<(Vec<BookSummary>, Meta)> {
    let finder = Books::find()
        .filter(Column::Genre.eq(CLASSIC_GENRE))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id);
    fetch_page(orm, finder, pagination).await
}

async fn discount_page(
    orm: &OrmConn,
    pagination: Pagination,
) -> AppResult<(Vec<BookSummary>, Meta)> {
    let finder = Books::find()
        .filter(Column::DiscountPercent.gt(0))
        .order_by_desc(Column::DiscountPercent)
        .order_by_asc(Column::Id);
    fetch_page(orm, finder, pagination).await
}

async fn popular_page(
    orm: &OrmConn,
    pagination: Pagination,
) -> AppResult<(Vec<BookSummary>, Meta)> {
    let finder = Books::find()
        .order_by_desc(Column::DiscountPercent)
        .order_by_asc(Column::Id);
    fetch_page(orm, finder, pagination).await
}

pub async fn new_books(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<BookList>> {
    Ok(page_response("New books", new_page(&state.orm, pagination).await?))
}

pub async fn classic_books(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<BookList>> {
    Ok(page_response(
        "Classic books",
        classic_page(&state.orm, pagination).await?,
    ))
}

pub async fn discount_books(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<BookList>> {
    Ok(page_response(
        "Discount books",
        discount_page(&state.orm, pagination).await?,
    ))
}

pub async fn popular_books(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<BookList>> {
    Ok(page_response(
        "Popular books",
        popular_page(&state.orm, pagination).await?,
    ))
}

pub async fn home(state: &AppState) -> AppResult<ApiResponse<HomeBooks>> {
    let first = Pagination::default();
    let ((new_books, _), (classic_books, _), (discount_books, _), (popular_books, _)) = tokio::try_join!(
        new_page(&state.orm, first),
        classic_page(&state.orm, first),
        discount_page(&state.orm, first),
        popular_page(&state.orm, first),
    )?;

    Ok(ApiResponse::success(
        "Home",
        HomeBooks {
            new_books,
            classic_books,
            discount_books,
            popular_books,
        },
        Some(Meta::empty()),
    ))
}

async fn find_book(orm: &OrmConn, id: Uuid) -> AppResult<BookModel> {
    Books::find_by_id(id)
        .one(orm)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id '{id}' not found")))
}

pub async fn get_book(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Book>> {
    let book = find_book(&state.orm, id).await?;
    Ok(ApiResponse::success("Book", book_detail(book), None))
}

/// Same genre first, then same author, then same year; duplicates dropped.
pub fn merge_related(groups: [Vec<BookModel>; 3]) -> Vec<BookSummary> {
    let mut seen = Vec::new();
    groups
        .into_iter()
        .flatten()
        .filter(|book| {
            if seen.contains(&book.id) {
                false
            } else {
                seen.push(book.id);
                true
            }
        })
        .map(|book| book_summary(book, ImageSize::Small))
        .collect()
}

pub async fn related_books(state: &AppState, id: Uuid) -> AppResult<ApiResponse<BookList>> {
    let book = find_book(&state.orm, id).await?;
    let others = || Books::find().filter(Column::Id.ne(book.id)).order_by_asc(Column::Id);

    let same_genre = others()
        .filter(Column::Genre.eq(book.genre.clone()))
        .limit(RELATED_SAME_GENRE)
        .all(&state.orm);
    let same_author = others()
        .filter(Column::Author.eq(book.author.clone()))
        .limit(RELATED_SAME_AUTHOR)
        .all(&state.orm);
    let same_year = async {
        match book.publication_year {
            Some(year) => {
                others()
                    .filter(Column::PublicationYear.eq(year))
                    .limit(RELATED_SAME_YEAR)
                    .all(&state.orm)
                    .await
            }
            None => Ok(Vec::new()),
        }
    };

    let (same_genre, same_author, same_year) =
        tokio::try_join!(same_genre, same_author, same_year)?;
    let items = merge_related([same_genre, same_author, same_year]);

    Ok(ApiResponse::success(
        "Related books",
        BookList { items },
        Some(Meta::empty()),
    ))
}
