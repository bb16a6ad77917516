//! Address book entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marigold_core::{AddressId, UserId};

use crate::error::FieldErrors;

/// A stored shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Validated address fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInput {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl TryFrom<AddressPayload> for AddressInput {
    type Error = FieldErrors;

    fn try_from(payload: AddressPayload) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();
        let mut required = |field: &str, value: Option<String>| {
            let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
            if value.is_empty() {
                errors.add(field, format!("{field} is required"));
            }
            value
        };

        let name = required("name", payload.name);
        let phone = required("phone", payload.phone);
        let line1 = required("line1", payload.line1);
        let city = required("city", payload.city);
        let state = required("state", payload.state);
        let postal_code = required("postalCode", payload.postal_code);
        let country = required("country", payload.country);

        errors.finish_with(Self {
            name,
            phone,
            line1,
            line2: payload
                .line2
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            city,
            state,
            postal_code,
            country,
            is_default: payload.is_default,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_are_reported_together() {
        let payload = AddressPayload {
            name: Some("Asha".to_string()),
            city: Some("  ".to_string()),
            ..AddressPayload::default()
        };
        let errors = AddressInput::try_from(payload).unwrap_err();
        assert!(errors.get("name").is_none());
        assert_eq!(errors.get("city"), Some("city is required"));
        assert!(errors.get("postalCode").is_some());
        assert!(errors.get("line1").is_some());
    }

    #[test]
    fn test_blank_line2_becomes_none() {
        let payload = AddressPayload {
            name: Some("Asha".into()),
            phone: Some("9800000000".into()),
            line1: Some("12 MG Road".into()),
            line2: Some(" ".into()),
            city: Some("Pune".into()),
            state: Some("MH".into()),
            postal_code: Some("411001".into()),
            country: Some("IN".into()),
            is_default: false,
        };
        let input = AddressInput::try_from(payload).unwrap();
        assert_eq!(input.line2, None);
    }
}
