
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::tea_review::{DEFAULT_RATING, RATING_CHOICES};

pub const NON_FIELD_ERRORS: &str = "__all__";
pub const REQUIRED: &str = "This field is required.";
pub const NICKNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex")
});

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "abc12345", "letmein1", "passw0rd", "11111111",
    "00000000", "trustno1", "superman", "dragon12", "starwars", "whatever",
];

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, msg: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn single(field: &str, msg: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, msg);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> String {
    let value = value.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_string()
}

fn check_email(errors: &mut FieldErrors, field: &str, email: &str) {
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.add(field, "Enter a valid email address.");
    }
}

// only the domain part is lowercased
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub password1: Option<String>,
    pub password2: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub nickname: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::default();

        let email = normalize_email(&required(&mut errors, "email", &self.email));
        check_email(&mut errors, "email", &email);

        let nickname = required(&mut errors, "nickname", &self.nickname);
        if nickname.chars().count() > NICKNAME_MAX_LEN {
            errors.add(
                "nickname",
                format!("Ensure this value has at most {} characters.", NICKNAME_MAX_LEN),
            );
        }

        // passwords are never trimmed
        let password1 = self.password1.clone().unwrap_or_default();
        let password2 = self.password2.clone().unwrap_or_default();
        if password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !password1.is_empty() && !password2.is_empty() {
            if password1 != password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for msg in password_policy(&password1, &[("email", &email), ("nickname", &nickname)]) {
                    errors.add("password2", msg);
                }
            }
        }

        errors.into_result(Registration {
            email,
            nickname,
            password: password1,
        })
    }

    // passwords are never echoed
    pub fn echo(&self) -> serde_json::Value {
        serde_json::json!({
            "email": self.email.as_deref().unwrap_or_default(),
            "nickname": self.nickname.as_deref().unwrap_or_default(),
        })
    }
}

pub const MAX_SIMILARITY: f64 = 0.7;

pub fn password_policy(password: &str, attributes: &[(&str, &str)]) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();

    for (name, value) in attributes {
        let value = value.to_lowercase();
        let similar = value
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .chain(std::iter::once(value.as_str()))
            .filter(|part| !part.is_empty())
            .any(|part| similarity(&lowered, part) >= MAX_SIMILARITY);
        if similar {
            problems.push(format!("The password is too similar to the {}.", name));
            break;
        }
    }

    if password.chars().count() < PASSWORD_MIN_LEN {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            PASSWORD_MIN_LEN
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

// 2 * lcs / (len(a) + len(b)), 1.0 for identical strings
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let lcs = prev[b.len()];
    2.0 * lcs as f64 / (a.len() + b.len()) as f64
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInForm {
    #[serde(alias = "username")]
    pub email: Option<String>,
    pub password: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::default();
        let email = normalize_email(&required(&mut errors, "email", &self.email));
        check_email(&mut errors, "email", &email);
        let password = self.password.clone().unwrap_or_default();
        if password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(Credentials { email, password })
    }

    pub fn echo(&self) -> serde_json::Value {
        serde_json::json!({ "email": self.email.as_deref().unwrap_or_default() })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewForm {
    pub rating: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    pub rating: i32,
    pub content: String,
}

impl ReviewForm {
    pub fn validate(&self) -> Result<ReviewInput, FieldErrors> {
        let mut errors = FieldErrors::default();

        let raw_rating = required(&mut errors, "rating", &self.rating);
        let rating = raw_rating.parse::<i32>().ok().filter(|r| RATING_CHOICES.iter().any(|(v, _)| v == r));
        if rating.is_none() && !raw_rating.is_empty() {
            errors.add(
                "rating",
                format!("Select a valid choice. {} is not one of the available choices.", raw_rating),
            );
        }

        let content = required(&mut errors, "content", &self.content);

        errors.into_result(ReviewInput {
            rating: rating.unwrap_or(DEFAULT_RATING),
            content,
        })
    }

    pub fn echo(&self) -> serde_json::Value {
        serde_json::json!({
            "rating": self.rating.as_deref().unwrap_or_default(),
            "content": self.content.as_deref().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub value: i32,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub label: &'static str,
    pub widget: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<serde_json::Value>,
}

impl FieldSchema {
    fn new(name: &'static str, label: &'static str, widget: &'static str) -> Self {
        Self {
            name,
            label,
            widget,
            required: true,
            max_length: None,
            choices: None,
            initial: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormSchema {
    pub action: String,
    pub fields: Vec<FieldSchema>,
}

pub fn register_schema(action: &str) -> FormSchema {
    let mut nickname = FieldSchema::new("nickname", "Nickname", "text");
    nickname.max_length = Some(NICKNAME_MAX_LEN);
    FormSchema {
        action: action.to_string(),
        fields: vec![
            FieldSchema::new("email", "Email address", "email"),
            nickname,
            FieldSchema::new("password1", "Password", "password"),
            FieldSchema::new("password2", "Password (again)", "password"),
        ],
    }
}

pub fn signin_schema(action: &str) -> FormSchema {
    FormSchema {
        action: action.to_string(),
        fields: vec![
            FieldSchema::new("email", "Email address", "email"),
            FieldSchema::new("password", "Password", "password"),
        ],
    }
}

pub fn review_schema(action: &str) -> FormSchema {
    let mut rating = FieldSchema::new("rating", "Rating", "select");
    rating.choices = Some(
        RATING_CHOICES
            .iter()
            .map(|(value, label)| Choice { value: *value, label: *label })
            .collect(),
    );
    rating.initial = Some(DEFAULT_RATING.into());
    FormSchema {
        action: action.to_string(),
        fields: vec![rating, FieldSchema::new("content", "Review", "textarea")],
    }
}
