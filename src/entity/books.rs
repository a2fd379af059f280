use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
