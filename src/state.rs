use crate::{
    db::{DbPool, OrmConn},
    shipping::{GhnClient, ShippingCache},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub ghn: GhnClient,
    pub cache: ShippingCache,
}
