use actix_web::{web, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use serde::Serialize;

use super::{favorite_add_url, favorite_cancel_url, query_count, review_url, tea_detail_url};
use crate::auth::OptionalAuthUser;
use crate::error::AppError;
use crate::forms::{review_schema, FormSchema};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(list_published)))
        .service(web::resource("/teas/{id:\\d+}/").route(web::get().to(published_detail)));
}

#[derive(Debug, FromQueryResult)]
struct TeaRow {
    id: i32,
    name: String,
    description: String,
    published_at: Option<DateTime<Utc>>,
    favorites_count: i64,
    is_favorited: bool,
}

#[derive(Debug, FromQueryResult)]
struct ReviewRow {
    id: i32,
    user_id: i32,
    nickname: String,
    rating: i32,
    content: String,
    created: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct TeaDto {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub published_at: Option<String>,
    pub favorites_count: i64,
    pub is_favorited: bool,
    pub detail_url: String,
    pub add_url: String,
    pub cancel_url: String,
}

#[derive(Serialize)]
pub struct ReviewDto {
    pub id: i32,
    pub user_id: i32,
    pub nickname: String,
    pub rating: i32,
    pub content: String,
    pub created: Option<String>,
}

#[derive(Serialize)]
struct TeaListView {
    teas: Vec<TeaDto>,
}

#[derive(Serialize)]
struct TeaDetailView {
    tea: TeaDto,
    reviews: Vec<ReviewDto>,
    user_has_reviewed: bool,
    review_form: Option<FormSchema>,
}

async fn list_published(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    let teas = find_published(db.get_ref(), Utc::now(), auth.user_id(), None).await?;
    Ok(HttpResponse::Ok().json(TeaListView { teas }))
}

async fn published_detail(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tea_id = path.into_inner();
    let viewer = auth.user_id();
    let tea = find_published_one(db.get_ref(), Utc::now(), viewer, tea_id).await?;
    let reviews = list_reviews(db.get_ref(), tea_id).await?;

    let user_has_reviewed = match viewer {
        Some(uid) => has_reviewed(db.get_ref(), uid, tea_id).await?,
        None => false,
    };
    let review_form = if viewer.is_some() && !user_has_reviewed {
        Some(review_schema(&review_url(tea_id)))
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(TeaDetailView {
        tea,
        reviews,
        user_has_reviewed,
        review_form,
    }))
}

pub async fn find_published(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    viewer: Option<i32>,
    tea_id: Option<i32>,
) -> Result<Vec<TeaDto>, AppError> {
    let mut values: Vec<sea_orm::Value> = Vec::new();
    let favorited = match viewer {
        Some(uid) => {
            values.push(uid.into());
            "exists(select 1 from t_favorite_tea mf where mf.tea_id = t.id and mf.user_id = ?)"
        }
        None => "0",
    };
    values.push(now.into());
    if let Some(id) = tea_id {
        values.push(id.into());
    }

    let sql = format!(
        "select t.id, t.name, t.description, t.published_at, \
         (select count(1) from t_favorite_tea f where f.tea_id = t.id) as favorites_count, \
         {} as is_favorited \
         from t_tea t \
         where t.published_at is not null and t.published_at < ?{} \
         order by t.id",
        favorited,
        if tea_id.is_some() { " and t.id = ?" } else { "" },
    );

    let stmt = Statement::from_sql_and_values(db.get_database_backend(), &sql, values);
    let rows = TeaRow::find_by_statement(stmt).all(db).await?;
    Ok(rows.into_iter().map(to_tea_dto).collect())
}

// unpublished teas 404 like missing ones
pub async fn find_published_one(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    viewer: Option<i32>,
    tea_id: i32,
) -> Result<TeaDto, AppError> {
    find_published(db, now, viewer, Some(tea_id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(AppError::tea_not_found)
}

async fn list_reviews(db: &DatabaseConnection, tea_id: i32) -> Result<Vec<ReviewDto>, AppError> {
    let stmt = Statement::from_sql_and_values(
        db.get_database_backend(),
        "select r.id, r.user_id, u.nickname, r.rating, r.content, r.created \
         from t_tea_review r join t_user u on u.id = r.user_id \
         where r.tea_id = ? \
         order by r.created desc, r.id desc",
        vec![tea_id.into()],
    );
    let rows = ReviewRow::find_by_statement(stmt).all(db).await?;
    Ok(rows
        .into_iter()
        .map(|r| ReviewDto {
            id: r.id,
            user_id: r.user_id,
            nickname: r.nickname,
            rating: r.rating,
            content: r.content,
            created: r.created.map(to_rfc3339),
        })
        .collect())
}

async fn has_reviewed(db: &DatabaseConnection, user_id: i32, tea_id: i32) -> Result<bool, AppError> {
    let count = query_count(
        db,
        "select count(1) as cnt from t_tea_review where user_id = ? and tea_id = ?",
        vec![user_id.into(), tea_id.into()],
    )
    .await?;
    Ok(count > 0)
}

fn to_tea_dto(row: TeaRow) -> TeaDto {
    TeaDto {
        detail_url: tea_detail_url(row.id),
        add_url: favorite_add_url(row.id),
        cancel_url: favorite_cancel_url(row.id),
        id: row.id,
        name: row.name,
        description: row.description,
        published_at: row.published_at.map(to_rfc3339),
        favorites_count: row.favorites_count,
        is_favorited: row.is_favorited,
    }
}

fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
