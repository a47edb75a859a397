//! Pass/fail input rules for the account endpoints.
//!
//! Every rule that fails contributes one [`FieldError`]; callers get the
//! full list at once rather than the first failure.

use domains::{DomainError, FieldError, Result};
use serde::Deserialize;

pub const MIN_PASSWORD_LEN: usize = 3;
pub const MAX_FULLNAME_LEN: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn validate_registration(input: &RegisterInput) -> Result<()> {
    let mut errors = Vec::new();
    check_email(&input.email, &mut errors);
    let fullname = input.fullname.trim();
    if fullname.is_empty() {
        errors.push(FieldError::new("fullname", "Fullname is required"));
    } else if fullname.chars().count() > MAX_FULLNAME_LEN {
        errors.push(FieldError::new("fullname", "Fullname is too long"));
    }
    check_password(&input.password, &mut errors);
    finish(errors)
}

pub fn validate_login(input: &LoginInput) -> Result<()> {
    let mut errors = Vec::new();
    check_email(&input.email, &mut errors);
    check_password(&input.password, &mut errors);
    finish(errors)
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !is_email(email.trim()) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 3 characters long",
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, fullname: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.into(),
            fullname: fullname.into(),
            password: password.into(),
        }
    }

    #[test]
    fn accepts_minimal_valid_registration() {
        assert!(validate_registration(&register("a@b.com", "A B", "pw1")).is_ok());
    }

    #[test]
    fn collects_every_failing_field() {
        let err = validate_registration(&register("nope", " ", "x")).unwrap_err();
        let DomainError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["email", "fullname", "password"]);
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("user@mail.example.org"));
        assert!(!is_email("user@localhost"));
        assert!(!is_email("@b.com"));
        assert!(!is_email("a@@b.com"));
        assert!(!is_email("a b@c.com"));
        assert!(!is_email("a@.com"));
    }

    #[test]
    fn login_requires_password() {
        let input = LoginInput {
            email: "a@b.com".into(),
            password: String::new(),
        };
        assert!(matches!(validate_login(&input), Err(DomainError::Validation(_))));
    }
}
