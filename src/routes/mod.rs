use actix_web::web;
use sea_orm::{ConnectionTrait, Statement};

use crate::error::AppError;

pub mod account;
pub mod favorite;
pub mod review;
pub mod tea;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/accounts").configure(account::config))
        .configure(favorite::config)
        .configure(review::config)
        .configure(tea::config);
}

pub fn tea_detail_url(tea_id: i32) -> String {
    format!("/teas/{}/", tea_id)
}

pub fn favorite_add_url(tea_id: i32) -> String {
    format!("/teas/{}/favorite/", tea_id)
}

pub fn favorite_cancel_url(tea_id: i32) -> String {
    format!("/teas/{}/favorite/cancel/", tea_id)
}

pub fn review_url(tea_id: i32) -> String {
    format!("/teas/{}/review/", tea_id)
}

async fn query_count<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<i64, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    let row = db
        .query_one(stmt)
        .await?
        .ok_or_else(AppError::system_exception)?;
    let cnt: i64 = row.try_get("", "cnt").unwrap_or(0);
    Ok(cnt)
}

async fn exec_sql<C: ConnectionTrait>(
    db: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<u64, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    let result = db.execute(stmt).await?;
    Ok(result.rows_affected())
}
