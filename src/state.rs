use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    pdf::BodyFont,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub font: Arc<BodyFont>,
}

impl AppState {
    pub fn new(pool: DbPool, font: BodyFont) -> Self {
        let orm = crate::db::create_orm_conn(&pool);
        Self {
            pool,
            orm,
            font: Arc::new(font),
        }
    }
}
