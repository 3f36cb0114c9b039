use actix_web::{
    error::UrlencodedError,
    http::header,
    HttpRequest, HttpResponse, ResponseError,
};
use serde::Serialize;

use crate::error::AppError;
use crate::forms::FieldErrors;
use crate::routes::account::SIGNIN_URL;

#[derive(Serialize)]
pub struct FailureDto<'a> {
    pub success: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'a FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<&'static str>,
}

pub fn form_error_handler(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    log::warn!("rejected form payload: {}", err);
    AppError::param_error("invalid form payload").into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    let dto = match err {
        AppError::Validation { errors, form } => FailureDto {
            success: false,
            msg: err.to_string(),
            errors: Some(errors),
            form: Some(form),
            login_url: None,
        },
        AppError::Unauthorized => FailureDto {
            success: false,
            msg: err.to_string(),
            errors: None,
            form: None,
            login_url: Some(SIGNIN_URL),
        },
        _ => FailureDto {
            success: false,
            msg: err.to_string(),
            errors: None,
            form: None,
            login_url: None,
        },
    };
    HttpResponse::build(err.status_code()).json(dto)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}
