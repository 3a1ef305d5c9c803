#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

/// Wall-clock instant as nanoseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimeNs(pub u64);

const NS_PER_SEC: u64 = 1_000_000_000;
const SECS_PER_DAY: u64 = 86_400;

impl MonotonicTimeNs {
    /// Days since the unix epoch (UTC).
    pub fn utc_day_index(self) -> u64 {
        self.0 / NS_PER_SEC / SECS_PER_DAY
    }

    pub fn utc_date(self) -> chrono::NaiveDate {
        let secs = (self.0 / NS_PER_SEC) as i64;
        chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or(chrono::NaiveDate::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReasonCodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field} out of range [{min}, {max}]: got {got}")]
    InvalidRange {
        field: &'static str,
        min: u64,
        max: u64,
        got: u64,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub fn validate_id(field: &'static str, s: &str, max_len: usize) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    if !s.is_ascii() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be ASCII",
        });
    }
    Ok(())
}

/// Free text: non-empty after trimming and at most `max_chars` characters.
pub fn validate_text(
    field: &'static str,
    s: &str,
    max_chars: usize,
) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.chars().count() > max_chars {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    Ok(())
}

pub fn validate_opt_text(
    field: &'static str,
    s: &Option<String>,
    max_chars: usize,
) -> Result<(), ContractViolation> {
    match s {
        Some(v) => validate_text(field, v, max_chars),
        None => Ok(()),
    }
}

pub fn validate_http_url(field: &'static str, raw: &str) -> Result<(), ContractViolation> {
    if raw.len() > 200 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be <= 200 chars",
        });
    }
    let parsed = url::Url::parse(raw).map_err(|_| ContractViolation::InvalidValue {
        field,
        reason: "must be an absolute URL",
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "scheme must be http or https",
        });
    }
    Ok(())
}

/// Collapses surrounding whitespace; empty input becomes `None`.
pub fn normalize_opt(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
