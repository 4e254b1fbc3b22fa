use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ServiceError;

pub const DEFAULT_MAX_SECRET_LEN: usize = 128;
pub const DEFAULT_MIN_TTL: Duration = Duration::from_secs(5 * 60);

/// 9999-12-31T23:59:59Z, the last instant RFC 3339 can spell with a four-digit year.
const LATEST_EXPIRY: i64 = 253_402_300_799;

/// Bounds applied to every new secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum secret size in bytes.
    pub max_secret_len: usize,
    pub min_ttl: Duration,
    pub max_ttl: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_secret_len: DEFAULT_MAX_SECRET_LEN,
            min_ttl: DEFAULT_MIN_TTL,
            max_ttl: None,
        }
    }
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A TTL that passed validation, with the instant it runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidTtl {
    pub seconds: u64,
    pub expires_at: DateTime<Utc>,
}

/// Check every field of a create request, reporting all failures at once.
pub fn check_create(
    secret: &str,
    ttl: i64,
    limits: &Limits,
    now: DateTime<Utc>,
) -> Result<ValidTtl, ServiceError> {
    match (check_secret(secret, limits), check_ttl(ttl, limits, now)) {
        (Ok(()), Ok(ttl)) => Ok(ttl),
        (secret, ttl) => Err(ServiceError::Validation(
            secret.err().into_iter().chain(ttl.err()).collect(),
        )),
    }
}

pub fn check_secret(secret: &str, limits: &Limits) -> Result<(), FieldError> {
    if secret.is_empty() {
        return Err(FieldError::new("secret", "cannot be blank"));
    }
    if secret.len() > limits.max_secret_len {
        return Err(FieldError::new(
            "secret",
            format!("the length must be no more than {}", limits.max_secret_len),
        ));
    }
    Ok(())
}

pub fn check_ttl(ttl: i64, limits: &Limits, now: DateTime<Utc>) -> Result<ValidTtl, FieldError> {
    if ttl == 0 {
        return Err(FieldError::new("ttl", "cannot be blank"));
    }
    let seconds = u64::try_from(ttl).unwrap_or(0);
    if seconds < limits.min_ttl.as_secs() {
        return Err(FieldError::new(
            "ttl",
            format!(
                "TTL must be at least {}",
                humantime::format_duration(limits.min_ttl)
            ),
        ));
    }
    if let Some(max) = limits.max_ttl {
        if seconds > max.as_secs() {
            return Err(FieldError::new(
                "ttl",
                format!("TTL must be no more than {}", humantime::format_duration(max)),
            ));
        }
    }
    let expires_at = TimeDelta::try_seconds(ttl)
        .and_then(|delta| now.checked_add_signed(delta))
        .filter(|at| at.timestamp() <= LATEST_EXPIRY)
        .ok_or_else(|| FieldError::new("ttl", "TTL is too large"))?;
    Ok(ValidTtl {
        seconds,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: FieldError) -> (&'static str, String) {
        (err.field, err.message)
    }

    #[test]
    fn secret_rules() {
        let limits = Limits::default();
        let cases = [
            ("success", "test".to_string(), None),
            ("at limit", "x".repeat(128), None),
            ("required", String::new(), Some("cannot be blank")),
            ("too long", "x".repeat(130), Some("the length must be no more than 128")),
            // 43 three-byte characters: 129 bytes.
            ("counted in bytes", "€".repeat(43), Some("the length must be no more than 128")),
        ];
        for (name, secret, want) in cases {
            let got = check_secret(&secret, &limits).err().map(field_of);
            match want {
                None => assert!(got.is_none(), "{name}: unexpected {got:?}"),
                Some(msg) => assert_eq!(got, Some(("secret", msg.to_string())), "{name}"),
            }
        }
    }

    #[test]
    fn ttl_rules() {
        let limits = Limits::default();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let ok = check_ttl(300, &limits, now).unwrap();
        assert_eq!(ok.seconds, 300);
        assert_eq!(ok.expires_at.timestamp(), 1_700_000_300);

        let (field, msg) = field_of(check_ttl(30, &limits, now).unwrap_err());
        assert_eq!(field, "ttl");
        assert_eq!(msg, "TTL must be at least 5m");

        assert_eq!(field_of(check_ttl(0, &limits, now).unwrap_err()).1, "cannot be blank");
        assert_eq!(field_of(check_ttl(-600, &limits, now).unwrap_err()).0, "ttl");
        assert_eq!(
            field_of(check_ttl(i64::MAX, &limits, now).unwrap_err()).1,
            "TTL is too large"
        );
    }

    #[test]
    fn optional_max_ttl() {
        let limits = Limits {
            max_ttl: Some(Duration::from_secs(3600)),
            ..Limits::default()
        };
        let now = DateTime::from_timestamp(0, 0).unwrap();
        assert!(check_ttl(3600, &limits, now).is_ok());
        assert_eq!(
            field_of(check_ttl(3601, &limits, now).unwrap_err()).1,
            "TTL must be no more than 1h"
        );
    }

    #[test]
    fn expiry_must_fit_a_four_digit_year() {
        let limits = Limits::default();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let last = check_ttl(LATEST_EXPIRY - 1_700_000_000, &limits, now).unwrap();
        assert_eq!(
            last.expires_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "9999-12-31T23:59:59Z"
        );

        assert_eq!(
            field_of(check_ttl(LATEST_EXPIRY - 1_700_000_000 + 1, &limits, now).unwrap_err()).1,
            "TTL is too large"
        );
        assert_eq!(
            field_of(check_ttl(1_000_000_000_000, &limits, now).unwrap_err()).1,
            "TTL is too large"
        );
    }

    #[test]
    fn create_reports_every_failing_field() {
        let limits = Limits::default();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let errors = match check_create("", 30, &limits, now) {
            Err(ServiceError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert_eq!(
            errors,
            vec![
                FieldError::new("secret", "cannot be blank"),
                FieldError::new("ttl", "TTL must be at least 5m"),
            ]
        );

        match check_create("ok", 0, &limits, now) {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(errors, vec![FieldError::new("ttl", "cannot be blank")])
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert_eq!(check_create("ok", 300, &limits, now).unwrap().seconds, 300);
    }
}
