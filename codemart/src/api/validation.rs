//! Request body validation.
//!
//! Every JSON body is deserialised into a typed request struct and then checked by its
//! [`Validate`] implementation before the handler runs. [`ValidatedJson`] does both, so a
//! handler that takes one never sees malformed input and nothing has been written when a
//! check fails. The first violated rule is reported as `400 Bad Request`.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::AppState;
use crate::auth::utils::{normalize_country_code, normalize_email, valid_email, valid_username};
use crate::config::Config;
use crate::errors::Error;

pub trait Validate {
    fn validate(&self, config: &Config) -> Result<(), Error>;
}

/// JSON body extractor that runs [`Validate`] after deserialising.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(json_rejection)?;
        value.validate(&state.config)?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> Error {
    Error::BadRequest {
        message: rejection.body_text(),
    }
}

pub(crate) fn check_username(username: &str) -> Result<(), Error> {
    if valid_username(username) {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".to_string(),
        })
    }
}

pub(crate) fn check_email(email: &str) -> Result<(), Error> {
    if valid_email(&normalize_email(email)) {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Invalid email address".to_string(),
        })
    }
}

pub(crate) fn check_password(password: &str, config: &Config) -> Result<(), Error> {
    let rules = &config.auth.native.password;
    let length = password.chars().count();
    if length < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", rules.min_length),
        });
    }
    if length > rules.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", rules.max_length),
        });
    }
    Ok(())
}

pub(crate) fn check_display_name(display_name: &str) -> Result<(), Error> {
    let length = display_name.trim().chars().count();
    if length == 0 || length > 100 {
        return Err(Error::BadRequest {
            message: "Display name must be between 1 and 100 characters".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_country_code(code: &str) -> Result<(), Error> {
    match normalize_country_code(code) {
        Some(_) => Ok(()),
        None => Err(Error::BadRequest {
            message: "Country code must be a two-letter ISO 3166-1 code".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::auth::{ChangePasswordRequest, LoginRequest, RegisterRequest};
    use crate::api::models::users::UserUpdate;

    fn register(username: &str, email: &str, password: &str, country: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: None,
            country_code: country.to_string(),
        }
    }

    #[test]
    fn test_register_validation_reports_first_violation() {
        let config = Config::default();

        assert!(register("alice", "alice@example.com", "secret123", "NG").validate(&config).is_ok());

        let err = register("a", "not-an-email", "x", "NG").validate(&config).unwrap_err();
        assert!(err.user_message().starts_with("Username"));

        let err = register("alice", "not-an-email", "x", "NG").validate(&config).unwrap_err();
        assert_eq!(err.user_message(), "Invalid email address");

        let err = register("alice", "alice@example.com", "short", "NG").validate(&config).unwrap_err();
        assert_eq!(err.user_message(), "Password must be at least 8 characters");

        let err = register("alice", "alice@example.com", "secret123", "Nigeria").validate(&config).unwrap_err();
        assert!(err.user_message().starts_with("Country code"));
    }

    #[test]
    fn test_password_bounds_follow_config() {
        let mut config = Config::default();
        config.auth.native.password.max_length = 10;

        let request = ChangePasswordRequest {
            current_password: "old-password".to_string(),
            new_password: "much-too-long-password".to_string(),
        };
        let err = request.validate(&config).unwrap_err();
        assert_eq!(err.user_message(), "Password must be no more than 10 characters");
    }

    #[test]
    fn test_login_only_checks_presence() {
        let config = Config::default();
        let ok = LoginRequest {
            username: "x".to_string(),
            password: "y".to_string(),
        };
        assert!(ok.validate(&config).is_ok());

        let missing = LoginRequest {
            username: " ".to_string(),
            password: "y".to_string(),
        };
        assert!(missing.validate(&config).is_err());
    }

    #[test]
    fn test_user_update_validation() {
        let config = Config::default();
        assert!(UserUpdate::default().validate(&config).is_ok());

        let bad_bank = UserUpdate {
            bank_details: Some(serde_json::json!("0123456789")),
            ..Default::default()
        };
        assert!(bad_bank.validate(&config).is_err());

        let empty_name = UserUpdate {
            display_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(empty_name.validate(&config).is_err());
    }
}
