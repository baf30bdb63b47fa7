//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Longest password accepted for verification
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validate email: one `@` with something on either side, no whitespace
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();

    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+$").ok()
    });

    match regex {
        Some(regex) if regex.is_match(email) => Ok(()),
        _ => Err("Invalid email format".to_string()),
    }
}

/// Validate a password presented for login: presence and an upper bound only
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@vanityhub.com").is_ok());
        assert!(validate_email(" Admin@Vanityhub.com ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
        assert!(validate_email("admin@localhost").is_ok());
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("two@at@signs").is_err());
        assert!(validate_email("spa ce@vanityhub.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Admin33#").is_ok());
        // weak passwords are still checked against the stored hash
        assert!(validate_password("x").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }
}
