//! Request field checks shared by the auth and profile handlers.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::{
    accounts::model::normalize_email,
    error::{AppError, FieldError},
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z\s]+$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>?").unwrap();
}

/// Strips HTML tags and surrounding whitespace.
pub fn sanitize(input: &str) -> String {
    TAG_RE.replace_all(input, "").trim().to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// `Json` whose rejections surface as 400 validation errors.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(AppError::validation("body", body_message(&rejection))),
        }
    }
}

fn body_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON body".to_string(),
        other => other.body_text(),
    }
}

/// Collects field errors; empty means the input passed.
#[derive(Debug, Default)]
pub struct Checks(Vec<FieldError>);

impl Checks {
    fn push(&mut self, field: &'static str, message: &str) {
        self.0.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn name(&mut self, field: &'static str, label: &str, value: &str) -> &mut Self {
        let len = value.chars().count();
        if !(2..=50).contains(&len) {
            self.push(field, &format!("{label} must be between 2 and 50 characters"));
        } else if !NAME_RE.is_match(value) {
            self.push(field, &format!("{label} can only contain letters and spaces"));
        }
        self
    }

    /// Returns the normalized email when it is valid.
    pub fn email(&mut self, value: &str) -> Option<String> {
        let email = normalize_email(value);
        if is_valid_email(&email) {
            Some(email)
        } else {
            self.push("email", "Please provide a valid email address");
            None
        }
    }

    pub fn new_password(&mut self, value: &str) -> &mut Self {
        if value.chars().count() < 6 {
            self.push("password", "Password must be at least 6 characters long");
        } else if !(value.chars().any(|c| c.is_ascii_lowercase())
            && value.chars().any(|c| c.is_ascii_uppercase())
            && value.chars().any(|c| c.is_ascii_digit()))
        {
            self.push(
                "password",
                "Password must contain at least one uppercase letter, \
                 one lowercase letter, and one number",
            );
        }
        self
    }

    pub fn present(&mut self, field: &'static str, message: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.push(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}
