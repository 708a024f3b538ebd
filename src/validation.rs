use regex::Regex;
use std::sync::LazyLock;

use crate::models::{CreatePostRequest, FieldErrors, LoginForm, RegisterForm, UpdateUserRequest};

/// Same loose shape check the client forms use: something, `@`, something, `.`, something.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("static email pattern compiles"));

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_POST_LENGTH: usize = 5000;

pub fn is_plausible_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    let email = email.trim();
    if email.is_empty() {
        errors.insert("email".into(), "Email address is required".into());
    } else if !is_plausible_email(email) {
        errors.insert("email".into(), "Enter a valid email address".into());
    }
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// validate_login
///
/// Email required and well-formed, password required.
pub fn validate_login(form: &LoginForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&form.email, &mut errors);

    if form.password.is_empty() {
        errors.insert("password".into(), "Password is required".into());
    }

    finish(errors)
}

/// validate_register
///
/// Name required, email as for login, password of at least 8 characters matching its
/// confirmation, terms accepted.
pub fn validate_register(form: &RegisterForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if form.name.trim().is_empty() {
        errors.insert("name".into(), "Full name is required".into());
    }

    check_email(&form.email, &mut errors);

    if form.password.is_empty() {
        errors.insert("password".into(), "Password is required".into());
    } else if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".into(),
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        );
    }

    if form.password != form.confirm_password {
        errors.insert("confirmPassword".into(), "Passwords do not match".into());
    }

    if !form.terms_accepted {
        errors.insert("termsAccepted".into(), "You must accept the terms".into());
    }

    finish(errors)
}

/// validate_profile_update
///
/// Only checks the fields that are present; an empty update is allowed.
pub fn validate_profile_update(update: &UpdateUserRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if let Some(email) = &update.email {
        check_email(email, &mut errors);
    }
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            errors.insert("name".into(), "Name cannot be empty".into());
        }
    }

    finish(errors)
}

pub fn validate_post(post: &CreatePostRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    let length = post.content.trim().chars().count();

    if length == 0 {
        errors.insert("content".into(), "Post cannot be empty".into());
    } else if length > MAX_POST_LENGTH {
        errors.insert(
            "content".into(),
            format!("Post cannot exceed {} characters", MAX_POST_LENGTH),
        );
    }

    finish(errors)
}
