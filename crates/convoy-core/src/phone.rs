use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A phone number in canonical E.164 form (`+` followed by 8-15 digits).
/// This is the unique caller key everywhere: storage, stream URLs,
/// greeting filenames.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct PhoneNumber(String);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number missing leading '+': {0}")]
    MissingCountryCode(String),
    #[error("phone number contains non-digit characters: {0}")]
    InvalidDigits(String),
    #[error("phone number length out of range: {0}")]
    BadLength(String),
}

impl PhoneNumber {
    /// Normalize a raw carrier-supplied number. Separator characters
    /// (spaces, dashes, dots, parentheses) are stripped; the result must
    /// be `+` followed by 8-15 digits.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        if cleaned.is_empty() {
            return Err(PhoneError::Empty);
        }
        let Some(digits) = cleaned.strip_prefix('+') else {
            return Err(PhoneError::MissingCountryCode(raw.to_owned()));
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::InvalidDigits(raw.to_owned()));
        }
        if !(8..=15).contains(&digits.len()) {
            return Err(PhoneError::BadLength(raw.to_owned()));
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number without its `+`, safe for filenames and URL path segments.
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PhoneNumber> for String {
    fn from(p: PhoneNumber) -> Self {
        p.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_e164() {
        let p = PhoneNumber::parse("+15551234567").unwrap();
        assert_eq!(p.as_str(), "+15551234567");
        assert_eq!(p.digits(), "15551234567");
    }

    #[test]
    fn strips_separators() {
        let p = PhoneNumber::parse("+1 (555) 123-4567").unwrap();
        assert_eq!(p.as_str(), "+15551234567");
    }

    #[test]
    fn rejects_missing_plus() {
        let err = PhoneNumber::parse("15551234567").unwrap_err();
        assert!(matches!(err, PhoneError::MissingCountryCode(_)));
    }

    #[test]
    fn rejects_letters() {
        let err = PhoneNumber::parse("+1555CALLNOW").unwrap_err();
        assert!(matches!(err, PhoneError::InvalidDigits(_)));
    }

    #[test]
    fn rejects_too_short_and_too_long() {
        assert!(matches!(
            PhoneNumber::parse("+1234567").unwrap_err(),
            PhoneError::BadLength(_)
        ));
        assert!(matches!(
            PhoneNumber::parse("+1234567890123456").unwrap_err(),
            PhoneError::BadLength(_)
        ));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(PhoneNumber::parse("").unwrap_err(), PhoneError::Empty);
        assert_eq!(PhoneNumber::parse(" - ").unwrap_err(), PhoneError::Empty);
    }

    #[test]
    fn serde_rejects_invalid() {
        let ok: Result<PhoneNumber, _> = serde_json::from_str("\"+15551234567\"");
        assert!(ok.is_ok());
        let bad: Result<PhoneNumber, _> = serde_json::from_str("\"5551234567\"");
        assert!(bad.is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let p = PhoneNumber::parse("+447911123456").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let parsed: PhoneNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }
}
