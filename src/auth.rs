use actix_web::{cookie::Cookie, dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::entity::user;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i32,
    pub nickname: String,
}

// anonymous or rejected tokens resolve to None
#[derive(Clone, Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "loginId")]
    login_id: i32,
    exp: usize,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let db = match req.app_data::<web::Data<DatabaseConnection>>() {
            Some(db) => db.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let token = extract_token(req, &config);

        Box::pin(async move {
            let token = token.ok_or_else(AppError::need_login)?;
            let auth = authenticate_token(&db, &config, &token).await?;
            Ok(auth)
        })
    }
}

impl FromRequest for OptionalAuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let db = match req.app_data::<web::Data<DatabaseConnection>>() {
            Some(db) => db.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let token = extract_token(req, &config);

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => return Ok(OptionalAuthUser(None)),
            };
            match authenticate_token(&db, &config, &token).await {
                Ok(auth) => Ok(OptionalAuthUser(Some(auth))),
                Err(AppError::Unauthorized) => Ok(OptionalAuthUser(None)),
                Err(e) => Err(e.into()),
            }
        })
    }
}

// header token wins over the session cookie
fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let header = config.token_header.as_str();
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            req.cookie(&config.session_cookie)
                .map(|c| c.value().trim().to_string())
                .filter(|v| !v.is_empty())
        })
}

async fn authenticate_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    token: &str,
) -> Result<AuthUser, AppError> {
    let claims = decode_jwt(config, token)?;
    let user = user::Entity::find_by_id(claims.login_id)
        .one(db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(AppError::need_login)?;

    Ok(AuthUser {
        user_id: user.id,
        nickname: user.nickname,
    })
}

fn decode_jwt(config: &AppConfig, token: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            warn!("rejected session token: {}", e);
            AppError::need_login()
        })
}

pub fn issue_token(config: &AppConfig, user_id: i32) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(config.session_days)).timestamp() as usize;
    let claims = Claims { login_id: user_id, exp };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())
}

pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build(config.session_cookie.clone(), token)
        .path("/")
        .http_only(true)
        .same_site(actix_web::cookie::SameSite::Lax)
        .max_age(actix_web::cookie::time::Duration::days(config.session_days))
        .finish()
}

pub fn expired_session_cookie(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(config.session_cookie.clone(), "")
        .path("/")
        .finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use sea_orm::Database;

    use crate::test_support::{seed_user, setup_db, test_config};

    fn request_with_token(db: DatabaseConnection, token: &str) -> HttpRequest {
        TestRequest::default()
            .app_data(web::Data::new(db))
            .app_data(web::Data::new(test_config()))
            .insert_header(("token", token.to_string()))
            .to_http_request()
    }

    #[test]
    fn issued_token_round_trips_user_id() {
        let config = test_config();
        let token = issue_token(&config, 42).unwrap();
        assert_eq!(decode_jwt(&config, &token).unwrap().login_id, 42);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut other = test_config();
        other.jwt_secret = "another-secret".to_string();
        let token = issue_token(&other, 42).unwrap();
        assert!(matches!(decode_jwt(&test_config(), &token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let claims = Claims {
            login_id: 1,
            exp: (Utc::now() - Duration::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(decode_jwt(&config, &token).is_err());
    }

    #[actix_web::test]
    async fn optional_user_ignores_rejected_tokens() {
        let db = setup_db().await;
        let ann = seed_user(&db, "ann@example.com", "ann").await;
        let mut other = test_config();
        other.jwt_secret = "another-secret".to_string();
        let forged = issue_token(&other, ann.id).unwrap();

        let req = request_with_token(db.clone(), &forged);
        let auth = OptionalAuthUser::from_request(&req, &mut Payload::None).await.unwrap();
        assert!(auth.0.is_none());

        let valid = issue_token(&test_config(), ann.id).unwrap();
        let req = request_with_token(db, &valid);
        let auth = OptionalAuthUser::from_request(&req, &mut Payload::None).await.unwrap();
        assert_eq!(auth.user_id(), Some(ann.id));
    }

    #[actix_web::test]
    async fn optional_user_surfaces_storage_failures() {
        // no schema, so the user lookup fails
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let token = issue_token(&test_config(), 1).unwrap();
        let req = request_with_token(db, &token);
        let result = OptionalAuthUser::from_request(&req, &mut Payload::None).await;
        assert!(result.is_err());
    }
}
