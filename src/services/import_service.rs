use std::ops::RangeInclusive;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError};

pub const PRICE_RANGE: RangeInclusive<i64> = 10_000..=10_000_000;
pub const MIN_PUBLICATION_YEAR: i32 = 1800;
pub const PAGE_COUNT_RANGE: RangeInclusive<i32> = 1..=10_000;

/// One record of the scraper's output file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBook {
    pub name: Option<String>,
    pub image: Option<String>,
    pub original_price: Option<i64>,
    #[serde(alias = "discountPrice")]
    pub current_price: Option<i64>,
    pub isbn: Option<String>,
    #[serde(alias = "genre")]
    pub category: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub dimensions: Option<String>,
    pub num_pages: Option<i32>,
    pub cover_type: Option<String>,
    pub description: Option<String>,
}

/// A record that passed validation and is ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub name: String,
    pub image: String,
    pub original_price: i64,
    pub current_price: i64,
    pub discount_percent: i32,
    pub isbn: Option<String>,
    pub genre: String,
    pub author: String,
    pub publication_year: Option<i32>,
    pub dimensions: Option<String>,
    pub num_pages: Option<i32>,
    pub cover_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_price(price: i64, field: &str) -> Result<i64, AppError> {
    if PRICE_RANGE.contains(&price) {
        Ok(price)
    } else {
        Err(AppError::BadRequest(format!("{field} {price} is out of range")))
    }
}

/// Percentage off the original price, rounded to the nearest integer.
pub fn discount_percent(original: i64, current: i64) -> i32 {
    if original <= 0 || current >= original {
        return 0;
    }
    let percent = ((original - current) as f64 / original as f64 * 100.0).round();
    percent as i32
}

impl ImportBook {
    pub fn validate(self) -> Result<NewBook, AppError> {
        let name = required(self.name, "name")?;
        let image = required(self.image, "image")?;
        let genre = required(self.category, "category")?;
        let author = required(self.author, "author")?;

        let original_price = self
            .original_price
            .ok_or_else(|| AppError::BadRequest("originalPrice is required".into()))?;
        let original_price = check_price(original_price, "originalPrice")?;
        let current_price = match self.current_price {
            Some(price) => check_price(price, "currentPrice")?,
            None => original_price,
        };

        if let Some(year) = self.publication_year {
            let max = Utc::now().year();
            if !(MIN_PUBLICATION_YEAR..=max).contains(&year) {
                return Err(AppError::BadRequest(format!(
                    "publicationYear {year} is out of range"
                )));
            }
        }
        if let Some(pages) = self.num_pages
            && !PAGE_COUNT_RANGE.contains(&pages)
        {
            return Err(AppError::BadRequest(format!(
                "numPages {pages} is out of range"
            )));
        }

        Ok(NewBook {
            name,
            image,
            original_price,
            current_price,
            discount_percent: discount_percent(original_price, current_price),
            isbn: optional(self.isbn),
            genre,
            author,
            publication_year: self.publication_year,
            dimensions: optional(self.dimensions),
            num_pages: self.num_pages,
            cover_type: optional(self.cover_type),
            description: optional(self.description),
        })
    }
}

pub async fn insert_book(pool: &DbPool, book: &NewBook) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO books (
            id, name, image, original_price, current_price, discount_percent, isbn,
            genre, author, publication_year, dimensions, num_pages, cover_type, description
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(id)
    .bind(&book.name)
    .bind(&book.image)
    .bind(book.original_price)
    .bind(book.current_price)
    .bind(book.discount_percent)
    .bind(&book.isbn)
    .bind(&book.genre)
    .bind(&book.author)
    .bind(book.publication_year)
    .bind(&book.dimensions)
    .bind(book.num_pages)
    .bind(&book.cover_type)
    .bind(&book.description)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Parse a JSON array of records. Entries that are not objects of the
/// expected shape are counted as skipped rather than failing the file.
pub fn parse_records(raw: &str) -> anyhow::Result<(Vec<ImportBook>, usize)> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let mut books = Vec::with_capacity(values.len());
    let mut malformed = 0;
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<ImportBook>(value) {
            Ok(book) => books.push(book),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed record");
                malformed += 1;
            }
        }
    }
    Ok((books, malformed))
}

/// Validate and insert every record on its own; one bad record never
/// blocks the rest.
pub async fn import_books(pool: &DbPool, records: Vec<ImportBook>) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for (index, record) in records.into_iter().enumerate() {
        let book = match record.validate() {
            Ok(book) => book,
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping invalid record");
                summary.skipped += 1;
                continue;
            }
        };
        match insert_book(pool, &book).await {
            Ok(id) => {
                tracing::debug!(index, %id, name = %book.name, "book inserted");
                summary.inserted += 1;
            }
            Err(err) => {
                tracing::warn!(index, error = %err, "insert failed");
                summary.skipped += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImportBook {
        serde_json::from_value(serde_json::json!({
            "name": "Số đỏ",
            "image": "https://res.cloudinary.com/demo/image/upload/so-do.jpg",
            "originalPrice": 120000,
            "discountPrice": 90000,
            "category": "Văn học kinh điển",
            "author": "Vũ Trọng Phụng",
            "publicationYear": 2018,
            "numPages": 256,
            "isbn": "  ",
        }))
        .unwrap()
    }

    #[test]
    fn scraper_field_names_are_accepted() {
        let book = record().validate().unwrap();
        assert_eq!(book.current_price, 90_000);
        assert_eq!(book.genre, "Văn học kinh điển");
        assert_eq!(book.discount_percent, 25);
        assert_eq!(book.isbn, None);
    }

    #[test]
    fn missing_current_price_means_no_discount() {
        let book = ImportBook {
            current_price: None,
            ..record()
        }
        .validate()
        .unwrap();
        assert_eq!(book.current_price, 120_000);
        assert_eq!(book.discount_percent, 0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            ImportBook { original_price: Some(9_999), ..record() },
            ImportBook { current_price: Some(20_000_000), ..record() },
            ImportBook { publication_year: Some(1799), ..record() },
            ImportBook { publication_year: Some(Utc::now().year() + 1), ..record() },
            ImportBook { num_pages: Some(0), ..record() },
            ImportBook { author: Some(" ".into()), ..record() },
            ImportBook { original_price: None, ..record() },
        ];
        for case in cases {
            assert!(case.validate().is_err());
        }
    }

    #[test]
    fn discount_rounds_and_never_goes_negative() {
        assert_eq!(discount_percent(30_000, 20_000), 33);
        assert_eq!(discount_percent(30_000, 35_000), 0);
        assert_eq!(discount_percent(0, 0), 0);
    }

    #[test]
    fn malformed_entries_are_counted_not_fatal() {
        let raw = r#"[{"name": "A"}, 42, {"name": 7}]"#;
        let (books, malformed) = parse_records(raw).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(malformed, 2);
        assert!(parse_records("{}").is_err());
    }
}
