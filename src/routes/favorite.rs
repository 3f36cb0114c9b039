use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;

use super::{exec_sql, favorite_add_url, favorite_cancel_url, query_count};
use crate::auth::AuthUser;
use crate::entity::tea;
use crate::error::AppError;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/teas/{id:\\d+}/favorite/")
            .route(web::post().to(add_favorite))
            .default_service(web::to(reject_method)),
    )
    .service(
        web::resource("/teas/{id:\\d+}/favorite/cancel/")
            .route(web::post().to(cancel_favorite))
            .default_service(web::to(reject_method)),
    );
}

#[derive(Serialize)]
struct FavoriteResponse {
    success: bool,
    is_favorited: bool,
    favorites_count: i64,
    add_url: String,
    cancel_url: String,
}

impl FavoriteResponse {
    fn new(tea_id: i32, is_favorited: bool, favorites_count: i64) -> Self {
        Self {
            success: true,
            is_favorited,
            favorites_count,
            add_url: favorite_add_url(tea_id),
            cancel_url: favorite_cancel_url(tea_id),
        }
    }
}

async fn add_favorite(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tea_id = path.into_inner();
    // any existing tea, published or not
    tea::Entity::find_by_id(tea_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(AppError::tea_not_found)?;

    let inserted = exec_sql(
        db.get_ref(),
        "insert into t_favorite_tea (user_id, tea_id, created) values (?, ?, ?) \
         on conflict (user_id, tea_id) do nothing",
        vec![auth.user_id.into(), tea_id.into(), Utc::now().into()],
    )
    .await?;
    if inserted > 0 {
        info!("user {} favorited tea {}", auth.user_id, tea_id);
    }

    let count = favorites_count(db.get_ref(), tea_id).await?;
    Ok(HttpResponse::Ok().json(FavoriteResponse::new(tea_id, true, count)))
}

async fn cancel_favorite(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tea_id = path.into_inner();
    tea::Entity::find_by_id(tea_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(AppError::tea_not_found)?;

    let removed = exec_sql(
        db.get_ref(),
        "delete from t_favorite_tea where user_id = ? and tea_id = ?",
        vec![auth.user_id.into(), tea_id.into()],
    )
    .await?;
    if removed > 0 {
        info!("user {} unfavorited tea {}", auth.user_id, tea_id);
    }

    let count = favorites_count(db.get_ref(), tea_id).await?;
    Ok(HttpResponse::Ok().json(FavoriteResponse::new(tea_id, false, count)))
}

async fn reject_method() -> Result<HttpResponse, AppError> {
    Err(AppError::method_not_allowed())
}

pub async fn favorites_count(db: &DatabaseConnection, tea_id: i32) -> Result<i64, AppError> {
    query_count(
        db,
        "select count(1) as cnt from t_favorite_tea where tea_id = ?",
        vec![tea_id.into()],
    )
    .await
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};
    use chrono::Duration;
    use serde_json::Value;

    use super::favorites_count;
    use crate::test_support::*;

    #[actix_web::test]
    async fn add_favorite_is_idempotent() {
        let db = setup_db().await;
        let tea = seed_tea(&db, "Sencha", Some(chrono::Utc::now() - Duration::days(1))).await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let app = test_app!(db);
        let uri = format!("/teas/{}/favorite/", tea.id);

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri(&uri)
                .insert_header(auth_header(ann.id))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["is_favorited"], true);
            assert_eq!(body["favorites_count"], 1);
            assert_eq!(body["add_url"], uri);
            assert_eq!(body["cancel_url"], format!("/teas/{}/favorite/cancel/", tea.id));
        }
        assert_eq!(favorites_count(&db, tea.id).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn count_tracks_distinct_users() {
        let db = setup_db().await;
        let tea = seed_tea(&db, "Sencha", Some(chrono::Utc::now() - Duration::days(1))).await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let bob = seed_user(&db, "bob@example.com", "bob").await;
        let app = test_app!(db);
        let uri = format!("/teas/{}/favorite/", tea.id);

        for user in [ann.id, bob.id, ann.id] {
            let req = test::TestRequest::post()
                .uri(&uri)
                .insert_header(auth_header(user))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::post()
            .uri(&format!("/teas/{}/favorite/cancel/", tea.id))
            .insert_header(auth_header(bob.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["is_favorited"], false);
        assert_eq!(body["favorites_count"], 1);
    }

    #[actix_web::test]
    async fn cancel_without_favorite_is_noop() {
        let db = setup_db().await;
        let tea = seed_tea(&db, "Sencha", Some(chrono::Utc::now() - Duration::days(1))).await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let bob = seed_user(&db, "bob@example.com", "bob").await;
        seed_favorite(&db, bob.id, tea.id).await;
        let app = test_app!(db);

        let req = test::TestRequest::post()
            .uri(&format!("/teas/{}/favorite/cancel/", tea.id))
            .insert_header(auth_header(ann.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["is_favorited"], false);
        assert_eq!(body["favorites_count"], 1);
    }

    #[actix_web::test]
    async fn unpublished_tea_can_still_be_favorited() {
        let db = setup_db().await;
        let draft = seed_tea(&db, "Draft", None).await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let app = test_app!(db);

        let req = test::TestRequest::post()
            .uri(&format!("/teas/{}/favorite/", draft.id))
            .insert_header(auth_header(ann.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn missing_tea_is_not_found() {
        let db = setup_db().await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let app = test_app!(db);

        let req = test::TestRequest::post()
            .uri("/teas/404/favorite/")
            .insert_header(auth_header(ann.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn anonymous_request_is_unauthorized() {
        let db = setup_db().await;
        let tea = seed_tea(&db, "Sencha", Some(chrono::Utc::now() - Duration::days(1))).await;
        let app = test_app!(db);

        let req = test::TestRequest::post()
            .uri(&format!("/teas/{}/favorite/", tea.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn get_is_rejected_with_failure_envelope() {
        let db = setup_db().await;
        let tea = seed_tea(&db, "Sencha", Some(chrono::Utc::now() - Duration::days(1))).await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let app = test_app!(db);

        for uri in [
            format!("/teas/{}/favorite/", tea.id),
            format!("/teas/{}/favorite/cancel/", tea.id),
        ] {
            let req = test::TestRequest::get()
                .uri(&uri)
                .insert_header(auth_header(ann.id))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], false);
        }
        assert_eq!(favorites_count(&db, tea.id).await.unwrap(), 0);
    }
}
