//! Payload checks for registration, login and profile updates.
//!
//! Every check stops at the first failing rule and reports it as
//! [`AppError::Validation`]; errors are never aggregated.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::dto::RegisterRequest;
use crate::error::{AppError, AppResult};
use crate::users::dto::UpdateUserRequest;

const MIN_NAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_PHONE_LEN: usize = 10;
const MIN_ADDRESS_LEN: usize = 5;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Unicode punctuation (`P*`) or symbol (`S*`) general category.
fn is_special(c: char) -> bool {
    lazy_static! {
        static ref SPECIAL_RE: Regex = Regex::new(r"^[\p{P}\p{S}]$").unwrap();
    }
    let mut buf = [0u8; 4];
    SPECIAL_RE.is_match(c.encode_utf8(&mut buf))
}

fn check_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(AppError::validation(
            "name must be at least 3 characters long",
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("email is not valid"));
    }
    Ok(())
}

fn check_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN || !password.chars().any(is_special) {
        return Err(AppError::validation(
            "password must be at least 6 characters long and include at least one special character",
        ));
    }
    Ok(())
}

fn check_phone(phone: &str) -> AppResult<()> {
    if phone.chars().count() < MIN_PHONE_LEN {
        return Err(AppError::validation(
            "phone must be at least 10 characters long",
        ));
    }
    Ok(())
}

fn check_address(address: &str) -> AppResult<()> {
    if address.chars().count() < MIN_ADDRESS_LEN {
        return Err(AppError::validation(
            "address must be at least 5 characters long",
        ));
    }
    Ok(())
}

/// Validates a registration (`is_registration = true`) or login payload.
/// Login skips the name and profile checks.
pub fn validate_user(user: &RegisterRequest, is_registration: bool) -> AppResult<()> {
    if is_registration {
        check_name(&user.name)?;
    }
    check_email(&user.email)?;
    check_password(&user.password)?;
    if is_registration {
        if let Some(phone) = user.phone.as_deref() {
            check_phone(phone)?;
        }
        if let Some(address) = user.address.as_deref() {
            check_address(address)?;
        }
    }
    Ok(())
}

/// Applies the per-field rules to each field present in an update.
pub fn validate_changes(req: &UpdateUserRequest) -> AppResult<()> {
    if let Some(name) = req.name.as_deref() {
        check_name(name)?;
    }
    if let Some(email) = req.email.as_deref() {
        check_email(email)?;
    }
    if let Some(password) = req.password.as_deref() {
        check_password(password)?;
    }
    if let Some(phone) = req.phone.as_deref() {
        check_phone(phone)?;
    }
    if let Some(address) = req.address.as_deref() {
        check_address(address)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    fn message(res: AppResult<()>) -> String {
        match res {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(validate_user(&register("Ann", "a@b.com", "Sup3r!"), true).is_ok());
    }

    #[test]
    fn short_name_is_rejected_first() {
        let msg = message(validate_user(&register("Al", "a@b.com", "short"), true));
        assert_eq!(msg, "name must be at least 3 characters long");
    }

    #[test]
    fn missing_name_is_rejected() {
        let msg = message(validate_user(&register("", "a@b.com", "Sup3r!"), true));
        assert_eq!(msg, "name is required");
    }

    #[test]
    fn login_skips_name() {
        assert!(validate_user(&register("", "a@b.com", "Sup3r!"), false).is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("john.doe+tag@mail.example.org"));
        assert!(!is_valid_email("John@example.com"));
        assert!(!is_valid_email("john@example.c"));
        assert!(!is_valid_email("john.example.com"));
        assert!(!is_valid_email("john@@example.com"));

        assert_eq!(
            message(validate_user(&register("Ann", "", "Sup3r!"), true)),
            "email is required"
        );
        assert_eq!(
            message(validate_user(&register("Ann", "nope", "Sup3r!"), true)),
            "email is not valid"
        );
    }

    #[test]
    fn password_rules() {
        assert_eq!(
            message(validate_user(&register("Ann", "a@b.com", ""), true)),
            "password is required"
        );
        // long enough but no special character
        assert!(validate_user(&register("Ann", "a@b.com", "Sup3rSecret"), true).is_err());
        // special character but too short
        assert!(validate_user(&register("Ann", "a@b.com", "a!b"), true).is_err());
        assert!(validate_user(&register("Ann", "a@b.com", "abcde€"), true).is_ok());
    }

    #[test]
    fn marks_and_format_chars_are_not_special() {
        assert!(is_special('!'));
        assert!(is_special('€'));
        assert!(is_special('«'));
        assert!(!is_special('\u{0301}'));
        assert!(!is_special('\u{200B}'));
        assert!(!is_special('é'));
        assert!(validate_user(&register("Ann", "a@b.com", "abcde\u{0301}"), true).is_err());
        assert!(validate_user(&register("Ann", "a@b.com", "abcde\u{200B}"), true).is_err());
    }

    #[test]
    fn optional_profile_fields_checked_when_present() {
        let mut req = register("Ann", "a@b.com", "Sup3r!");
        req.phone = Some("123".into());
        assert_eq!(
            message(validate_user(&req, true)),
            "phone must be at least 10 characters long"
        );
        req.phone = Some("0123456789".into());
        req.address = Some("x".into());
        assert_eq!(
            message(validate_user(&req, true)),
            "address must be at least 5 characters long"
        );
        req.address = Some("1 Main St".into());
        assert!(validate_user(&req, true).is_ok());
    }

    #[test]
    fn changes_are_checked_per_field() {
        let ok = UpdateUserRequest {
            name: Some("Bob".into()),
            ..Default::default()
        };
        assert!(validate_changes(&ok).is_ok());
        assert!(validate_changes(&UpdateUserRequest::default()).is_ok());

        let bad = UpdateUserRequest {
            name: Some("Bo".into()),
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert_eq!(
            message(validate_changes(&bad)),
            "name must be at least 3 characters long"
        );
    }
}
