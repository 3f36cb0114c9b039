use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::Utc;
use log::{error, info, warn};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::Deserialize;

use crate::auth::{expired_session_cookie, issue_token, session_cookie};
use crate::config::AppConfig;
use crate::db::{is_unique_violation, unique_violation_on};
use crate::entity::user;
use crate::error::AppError;
use crate::forms::{
    normalize_email, register_schema, signin_schema, FieldErrors, RegisterForm, SignInForm,
    NON_FIELD_ERRORS,
};
use crate::response::redirect;

pub const SIGNIN_URL: &str = "/accounts/signin/";
pub const REGISTER_URL: &str = "/accounts/register/";
pub const HOME_URL: &str = "/";

pub const DUPLICATE_EMAIL: &str = "A user with that email address already exists.";
pub const INVALID_LOGIN: &str = "Please enter a correct email address and password.";

const USERNAME_ATTEMPTS: usize = 3;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/register/")
            .route(web::get().to(register_form))
            .route(web::post().to(register)),
    )
    .service(
        web::resource("/signin/")
            .route(web::get().to(signin_form))
            .route(web::post().to(signin)),
    )
    .service(
        web::resource("/signout/")
            .route(web::get().to(signout))
            .route(web::post().to(signout)),
    );
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

pub fn signin_redirect(next: &str) -> HttpResponse {
    redirect(&format!("{}?next={}", SIGNIN_URL, urlencoding::encode(next)))
}

// same-site paths only, and nothing that cannot go into a Location header
fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && path.chars().all(|c| c.is_ascii_graphic()) =>
        {
            path
        }
        _ => HOME_URL,
    }
}

async fn register_form() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "form": register_schema(REGISTER_URL) }))
}

async fn signin_form(query: web::Query<NextQuery>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "form": signin_schema(SIGNIN_URL),
        "next": safe_next(query.next.as_deref()),
    }))
}

async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    let data = match form.validate() {
        Ok(data) => data,
        Err(mut errors) => {
            let email = normalize_email(form.email.as_deref().unwrap_or_default());
            if !errors.has("email") && email_taken(db.get_ref(), &email).await? {
                errors.add("email", DUPLICATE_EMAIL);
            }
            return Err(AppError::validation(errors, form.echo()));
        }
    };

    if email_taken(db.get_ref(), &data.email).await? {
        return Err(AppError::validation(
            FieldErrors::single("email", DUPLICATE_EMAIL),
            form.echo(),
        ));
    }

    let password_hash = hash(&data.password, config.bcrypt_cost).map_err(|e| {
        error!("password hashing failed: {}", e);
        AppError::system_exception()
    })?;
    let now = Utc::now();

    for _ in 0..USERNAME_ATTEMPTS {
        let user_model = user::ActiveModel {
            username: Set(generate_username()),
            email: Set(data.email.clone()),
            nickname: Set(data.nickname.clone()),
            password_hash: Set(password_hash.clone()),
            is_staff: Set(false),
            is_superuser: Set(false),
            is_active: Set(true),
            date_joined: Set(now),
            last_login: Set(None),
            ..Default::default()
        };

        match user_model.insert(db.get_ref()).await {
            Ok(created) => {
                info!("registered user {} ({})", created.id, created.username);
                return Ok(redirect(SIGNIN_URL));
            }
            Err(err) if unique_violation_on(&err, "email") => {
                return Err(AppError::validation(
                    FieldErrors::single("email", DUPLICATE_EMAIL),
                    form.echo(),
                ));
            }
            Err(err) if is_unique_violation(&err) => {
                warn!("generated username collided, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    error!("could not allocate a unique username");
    Err(AppError::system_exception())
}

async fn signin(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<NextQuery>,
    form: web::Form<SignInForm>,
) -> Result<HttpResponse, AppError> {
    let creds = form
        .validate()
        .map_err(|errors| AppError::validation(errors, form.echo()))?;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(creds.email.clone()))
        .one(db.get_ref())
        .await?;

    let authenticated = match user {
        Some(user) => {
            let ok = verify(&creds.password, &user.password_hash).map_err(|e| {
                error!("password verification failed: {}", e);
                AppError::system_exception()
            })?;
            Some(user).filter(|u| ok && u.is_active)
        }
        None => {
            // keep the unknown-email path as slow as a real check
            let _ = hash(&creds.password, config.bcrypt_cost);
            None
        }
    };

    let user = match authenticated {
        Some(user) => user,
        None => {
            warn!("failed sign-in attempt");
            return Err(AppError::validation(
                FieldErrors::single(NON_FIELD_ERRORS, INVALID_LOGIN),
                form.echo(),
            ));
        }
    };

    user::Entity::update_many()
        .col_expr(user::Column::LastLogin, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user.id))
        .exec(db.get_ref())
        .await?;

    let token = issue_token(&config, user.id)?;
    let next = safe_next(form.next.as_deref().or(query.next.as_deref()));
    info!("user {} signed in", user.id);

    let mut res = redirect(next);
    res.add_cookie(&session_cookie(&config, token))
        .map_err(|_| AppError::system_exception())?;
    Ok(res)
}

async fn signout(config: web::Data<AppConfig>) -> Result<HttpResponse, AppError> {
    let mut res = redirect(SIGNIN_URL);
    res.add_cookie(&expired_session_cookie(&config))
        .map_err(|_| AppError::system_exception())?;
    Ok(res)
}

async fn email_taken(db: &DatabaseConnection, email: &str) -> Result<bool, AppError> {
    if email.is_empty() {
        return Ok(false);
    }
    let count = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?;
    Ok(count > 0)
}

fn generate_username() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("user_{}", suffix.to_lowercase())
}
