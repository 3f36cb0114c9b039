use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::db::init_sqlite_schema;
use crate::entity::{favorite_tea, tea, tea_review, user};

pub const TEST_PASSWORD: &str = "oolong-leaf-42";

pub fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: String::new(),
        database_url: Some("sqlite::memory:".to_string()),
        jwt_secret: "test-secret".to_string(),
        token_header: "token".to_string(),
        session_cookie: "sessionid".to_string(),
        session_days: 1,
        bcrypt_cost: 4,
    }
}

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    init_sqlite_schema(&db).await.unwrap();
    db
}

macro_rules! test_app {
    ($db:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($crate::test_support::test_config()))
                .app_data(actix_web::web::Data::new($db.clone()))
                .app_data(
                    actix_web::web::FormConfig::default()
                        .error_handler($crate::response::form_error_handler),
                )
                .configure($crate::routes::configure),
        )
        .await
    };
}
pub(crate) use test_app;

pub fn auth_header(user_id: i32) -> (&'static str, String) {
    let token = issue_token(&test_config(), user_id).unwrap();
    ("token", token)
}

pub async fn seed_user(db: &DatabaseConnection, email: &str, nickname: &str) -> user::Model {
    user::ActiveModel {
        username: Set(format!("user_{}", nickname)),
        email: Set(email.to_string()),
        nickname: Set(nickname.to_string()),
        password_hash: Set(bcrypt::hash(TEST_PASSWORD, 4).unwrap()),
        is_staff: Set(false),
        is_superuser: Set(false),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_tea(db: &DatabaseConnection, name: &str, published_at: Option<DateTime<Utc>>) -> tea::Model {
    tea::ActiveModel {
        name: Set(name.to_string()),
        description: Set(format!("{} from the test garden", name)),
        published_at: Set(published_at),
        created: Set(Some(Utc::now())),
        updated: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_favorite(db: &DatabaseConnection, user_id: i32, tea_id: i32) -> favorite_tea::Model {
    favorite_tea::ActiveModel {
        user_id: Set(user_id),
        tea_id: Set(tea_id),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_review(
    db: &DatabaseConnection,
    user_id: i32,
    tea_id: i32,
    rating: i32,
    content: &str,
) -> tea_review::Model {
    tea_review::ActiveModel {
        user_id: Set(user_id),
        tea_id: Set(tea_id),
        rating: Set(rating),
        content: Set(content.to_string()),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
