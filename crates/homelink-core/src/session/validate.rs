// Client-side input checks, run before any network call.

use secrecy::{ExposeSecret, SecretString};

use homelink_api::models::{ProfileUpdate, Registration};

use crate::error::CoreError;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn login(username: &str, password: &SecretString) -> Result<(), CoreError> {
    if username.trim().is_empty() {
        return Err(CoreError::validation("username is required"));
    }
    if password.expose_secret().is_empty() {
        return Err(CoreError::validation("password is required"));
    }
    Ok(())
}

pub(crate) fn registration(reg: &Registration) -> Result<(), CoreError> {
    username(&reg.username)?;
    email(&reg.email)?;
    password(reg.password.expose_secret())
}

pub(crate) fn profile_update(update: &ProfileUpdate) -> Result<(), CoreError> {
    if update.is_empty() {
        return Err(CoreError::validation("nothing to update"));
    }
    if let Some(address) = &update.email {
        email(address)?;
    }
    Ok(())
}

pub(crate) fn username(name: &str) -> Result<(), CoreError> {
    let valid = USERNAME_LEN.contains(&name.chars().count())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CoreError::validation(
            "username must be 3-20 characters of letters, digits or underscores",
        ))
    }
}

pub(crate) fn email(address: &str) -> Result<(), CoreError> {
    match address.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(CoreError::validation(format!(
            "'{address}' is not an email address"
        ))),
    }
}

pub(crate) fn password(candidate: &str) -> Result<(), CoreError> {
    let valid = candidate.chars().count() >= MIN_PASSWORD_LEN
        && candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.chars().any(|c| c.is_ascii_alphabetic());
    if valid {
        Ok(())
    } else {
        Err(CoreError::validation(
            "password must be at least 8 characters with at least one letter and one digit",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(username("ana_92").is_ok());
        assert!(username("ab").is_err());
        assert!(username("a".repeat(21).as_str()).is_err());
        assert!(username("ana silva").is_err());
        assert!(username("ana-silva").is_err());
    }

    #[test]
    fn passwords_need_letters_and_digits() {
        assert!(password("hunter22").is_ok());
        assert!(password("hunter2").is_err());
        assert!(password("12345678").is_err());
        assert!(password("abcdefgh").is_err());
    }

    #[test]
    fn emails_need_both_halves() {
        assert!(email("ana@example.com").is_ok());
        assert!(email("ana.example.com").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("ana@").is_err());
    }

    #[test]
    fn login_requires_both_fields() {
        let empty = SecretString::from(String::new());
        let pw = SecretString::from("x".to_owned());
        assert!(login("", &pw).is_err());
        assert!(login("ana", &empty).is_err());
        assert!(login("ana", &pw).is_ok());
    }
}
