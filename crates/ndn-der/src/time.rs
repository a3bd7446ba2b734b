//! Generalized-time codec.
//!
//! Timestamps are milliseconds since the Unix epoch. The ISO form is
//! `YYYYMMDDThhmmss[.ffffff]`; the DER payload drops the fraction and the
//! `T` separator and appends `Z`.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{DerError, Result};

const ISO_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

fn to_datetime(ms: Timestamp) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| DerError::InvalidTime(format!("timestamp {ms} is out of range")))
}

/// Format a timestamp as `YYYYMMDDThhmmss[.ffffff]`.
///
/// The fractional part is only written when the timestamp is not on a whole
/// second.
///
/// # Errors
///
/// Returns `DerError::InvalidTime` if the timestamp cannot be represented.
pub fn to_iso_string(ms: Timestamp) -> Result<String> {
    let dt = to_datetime(ms)?;
    let base = dt.format(ISO_FORMAT).to_string();
    let millis = ms.rem_euclid(1000);
    if millis == 0 {
        Ok(base)
    } else {
        Ok(format!("{base}.{:06}", millis * 1000))
    }
}

/// Parse `YYYYMMDDThhmmss[.ffffff]` back into a timestamp.
///
/// # Errors
///
/// Returns `DerError::InvalidTime` if the string is not in ISO form.
pub fn from_iso_string(iso: &str) -> Result<Timestamp> {
    let (base, fraction) = match iso.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (iso, None),
    };

    let naive = NaiveDateTime::parse_from_str(base, ISO_FORMAT)
        .map_err(|e| DerError::InvalidTime(format!("`{iso}`: {e}")))?;
    let mut ms = naive.and_utc().timestamp_millis();

    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DerError::InvalidTime(format!("`{iso}`: bad fractional seconds")));
        }
        let micros = fraction
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(6)
            .fold(0i64, |acc, digit| acc * 10 + i64::from(digit - b'0'));
        ms += micros / 1000;
    }
    Ok(ms)
}

/// Build the DER payload (`YYYYMMDDhhmmssZ`) for a timestamp.
///
/// # Errors
///
/// Returns `DerError::InvalidTime` if the timestamp cannot be represented.
pub fn to_der_string(ms: Timestamp) -> Result<String> {
    let iso = to_iso_string(ms)?;
    let base = iso.split_once('.').map_or(iso.as_str(), |(base, _)| base);
    Ok(format!("{}Z", base.replacen('T', "", 1)))
}

/// Parse a DER generalized-time payload.
///
/// # Errors
///
/// Returns `DerError::InvalidTime` if the payload is not `YYYYMMDDhhmmss[.f]Z`.
pub fn from_der_string(der: &str) -> Result<Timestamp> {
    let body = der
        .strip_suffix('Z')
        .ok_or_else(|| DerError::InvalidTime(format!("`{der}`: missing trailing Z")))?;
    if body.len() < 14 || !body.is_char_boundary(8) {
        return Err(DerError::InvalidTime(format!("`{der}`: too short")));
    }
    let (date, rest) = body.split_at(8);
    from_iso_string(&format!("{date}T{rest}"))
}
