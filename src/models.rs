use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Image widths requested from the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Small,
    Medium,
}

impl ImageSize {
    pub fn width(self) -> u32 {
        match self {
            ImageSize::Small => 200,
            ImageSize::Medium => 480,
        }
    }
}

/// Rewrite a CDN upload URL so the CDN serves a resized rendition.
pub fn resize_image(url: &str, size: ImageSize) -> String {
    url.replacen(
        "/image/upload/",
        &format!("/image/upload/w_{}/", size.width()),
        1,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: Uuid,
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

/// Card-sized projection used by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub original_price: i64,
    pub current_price: i64,
    pub discount_percent: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub book_id: Uuid,
    pub quantity: i32,
}

/// The cart embedded in a user record.
///
/// Every mutation goes through [`Cart::normalize`], so a persisted cart never
/// holds an entry with a non-positive quantity or two entries for one book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new(items: Vec<CartItem>) -> Self {
        let mut cart = Self { items };
        cart.normalize();
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    pub fn quantity_of(&self, book_id: Uuid) -> Option<i32> {
        self.items
            .iter()
            .find(|item| item.book_id == book_id)
            .map(|item| item.quantity)
    }

    /// Increase the quantity of `book_id`, inserting it when missing.
    pub fn add(&mut self, book_id: Uuid, quantity: i32) {
        match self.items.iter_mut().find(|item| item.book_id == book_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.items.push(CartItem { book_id, quantity }),
        }
        self.normalize();
    }

    /// Overwrite the quantity of `book_id`; zero removes the entry.
    pub fn set_quantity(&mut self, book_id: Uuid, quantity: i32) {
        match self.items.iter_mut().find(|item| item.book_id == book_id) {
            Some(item) => item.quantity = quantity,
            None => self.items.push(CartItem { book_id, quantity }),
        }
        self.normalize();
    }

    /// Returns `false` when the book was not in the cart.
    pub fn remove(&mut self, book_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.book_id != book_id);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Take the quantities of `ordered` out of this cart. Lines that are not
    /// part of `ordered` stay untouched.
    pub fn subtract(&mut self, ordered: &Cart) {
        for taken in &ordered.items {
            if let Some(item) = self.items.iter_mut().find(|item| item.book_id == taken.book_id) {
                item.quantity = item.quantity.saturating_sub(taken.quantity);
            }
        }
        self.normalize();
    }

    /// Merge duplicate entries and drop non-positive quantities.
    pub fn normalize(&mut self) {
        let mut merged: Vec<CartItem> = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            match merged.iter_mut().find(|m| m.book_id == item.book_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => merged.push(item),
            }
        }
        merged.retain(|item| item.quantity > 0);
        self.items = merged;
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub book: BookSummary,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "MOMO")]
    Momo,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Momo => "MOMO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COD" => Some(PaymentMethod::Cod),
            "MOMO" => Some(PaymentMethod::Momo),
            _ => None,
        }
    }
}

/// A cart line frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub book_id: Uuid,
    pub name: String,
    pub image: String,
    pub unit_price: i64,
    pub quantity: i32,
}

pub fn order_quantity(items: &[OrderItem]) -> i64 {
    items.iter().map(|item| i64::from(item.quantity)).sum()
}

pub fn order_total(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .map(|item| item.unit_price * i64::from(item.quantity))
        .sum()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub recipient_name: String,
    pub phone: String,
    pub email: String,
    pub full_address: String,
    pub shipping_code: String,
    pub note: Option<String>,
    pub payment: PaymentMethod,
    pub shipping_fee: i64,
    pub quantity: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub items: Vec<OrderItem>,
}
