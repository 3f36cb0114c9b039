use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use super::tea_detail_url;
use crate::auth::OptionalAuthUser;
use crate::db::is_unique_violation;
use crate::entity::{tea, tea_review};
use crate::error::AppError;
use crate::forms::{FieldErrors, ReviewForm, NON_FIELD_ERRORS};
use crate::response::redirect;
use crate::routes::account::signin_redirect;

pub const ALREADY_REVIEWED: &str = "You have already reviewed this tea.";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/teas/{id:\\d+}/review/").route(web::post().to(add_review)));
}

async fn add_review(
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
    form: web::Form<ReviewForm>,
) -> Result<HttpResponse, AppError> {
    let tea_id = path.into_inner();
    let user = match auth.0 {
        Some(user) => user,
        None => return Ok(signin_redirect(&tea_detail_url(tea_id))),
    };

    let now = Utc::now();
    tea::Entity::find_by_id(tea_id)
        .one(db.get_ref())
        .await?
        .filter(|t| t.is_published(now))
        .ok_or_else(AppError::tea_not_found)?;

    let input = form
        .validate()
        .map_err(|errors| AppError::validation(errors, form.echo()))?;

    let review = tea_review::ActiveModel {
        user_id: Set(user.user_id),
        tea_id: Set(tea_id),
        rating: Set(input.rating),
        content: Set(input.content),
        created: Set(Some(now)),
        ..Default::default()
    };

    if let Err(err) = review.insert(db.get_ref()).await {
        if is_unique_violation(&err) {
            warn!("duplicate review from user {} on tea {}", user.user_id, tea_id);
            return Err(AppError::validation(
                FieldErrors::single(NON_FIELD_ERRORS, ALREADY_REVIEWED),
                form.echo(),
            ));
        }
        return Err(err.into());
    }
    info!("{} (user {}) reviewed tea {}", user.nickname, user.user_id, tea_id);

    Ok(redirect(&tea_detail_url(tea_id)))
}
