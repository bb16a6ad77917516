//! ISO 4217 currency codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned for a malformed currency code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("currency must be a three-letter ISO 4217 code")]
pub struct CurrencyError;

/// A three-letter, uppercase ISO 4217 currency code such as `INR`.
///
/// Only the shape is validated; the payment gateway decides which codes it
/// actually accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Indian rupee, the storefront's default currency.
    pub const INR: Self = Self(*b"INR");

    /// Parse a currency code, accepting lowercase input.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError`] unless the input is exactly three ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CurrencyError> {
        let bytes = s.trim().as_bytes();
        let [a, b, c] = bytes else {
            return Err(CurrencyError);
        };
        let code = [
            a.to_ascii_uppercase(),
            b.to_ascii_uppercase(),
            c.to_ascii_uppercase(),
        ];
        if code.iter().all(u8::is_ascii_uppercase) {
            Ok(Self(code))
        } else {
            Err(CurrencyError)
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII letters
        core::str::from_utf8(&self.0).unwrap_or("XXX")
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::INR
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases() {
        assert_eq!(Currency::parse("inr").unwrap(), Currency::INR);
        assert_eq!(Currency::parse("usd").unwrap().as_str(), "USD");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert!(Currency::parse("IN").is_err());
        assert!(Currency::parse("INRR").is_err());
        assert!(Currency::parse("1NR").is_err());
        assert!(Currency::parse("").is_err());
    }

    #[test]
    fn test_serde() {
        let c: Currency = serde_json::from_str("\"eur\"").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"EUR\"");
    }
}
