use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `(page, limit, offset)`, rejecting out-of-range values.
    pub fn validate(&self) -> AppResult<(i64, i64, i64)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page < 1 {
            return Err(AppError::BadRequest("Invalid page number".into()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest("Invalid page limit".into()));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::BadRequest("Invalid page number".into()))?;
        Ok((page, limit, offset))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookSort {
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Discount,
    Name,
}

/// One publication-year bucket from the `year` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBucket {
    Exact(i32),
    /// Inclusive on both ends.
    Range(i32, i32),
    /// Strictly older than the given year.
    Before(i32),
}

impl YearBucket {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let invalid = || AppError::BadRequest(format!("Invalid year filter '{raw}'"));
        let raw = raw.trim();
        let year = |s: &str| s.trim().parse::<i32>().map_err(|_| invalid());

        if let Some(rest) = raw.strip_prefix("before-") {
            return Ok(YearBucket::Before(year(rest)?));
        }
        match raw.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (year(from)?, year(to)?);
                if from > to {
                    return Err(invalid());
                }
                Ok(YearBucket::Range(from, to))
            }
            None => Ok(YearBucket::Exact(year(raw)?)),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Case-insensitive match on name or author.
    pub q: Option<String>,
    /// Comma-separated genres.
    pub genre: Option<String>,
    /// Comma-separated buckets: `2020`, `2015-2020` or `before-2000`.
    pub year: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<BookSort>,
}

/// A validated catalog filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub genres: Vec<String>,
    pub years: Vec<YearBucket>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<BookSort>,
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl BookQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn filter(&self) -> AppResult<BookFilter> {
        let genres = split_list(self.genre.as_deref()).map(str::to_string).collect();
        let years = split_list(self.year.as_deref())
            .map(YearBucket::parse)
            .collect::<AppResult<Vec<_>>>()?;

        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".into(),
            ));
        }
        if self.min_price.is_some_and(|p| p < 0) || self.max_price.is_some_and(|p| p < 0) {
            return Err(AppError::BadRequest("Prices must not be negative".into()));
        }

        Ok(BookFilter {
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            genres,
            years,
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
        })
    }
}
