//! Wire types for the identity service's JSON API.
//!
//! Decoding is strict where the domain needs it (ids, tokens) and lenient
//! where providers vary (metadata). Conversion into domain types happens
//! here so the transport adapter never touches raw JSON.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::ports::IssuedSession;
use crate::domain::{Identity, ProviderMetadata, SessionRecord};

/// User object as the identity service returns it.
#[derive(Debug, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl From<UserDto> for Identity {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            email: dto.email,
            metadata: ProviderMetadata::new(dto.user_metadata),
        }
    }
}

/// Token grant response: a session plus the user it authenticates.
#[derive(Debug, Deserialize)]
pub struct TokenDto {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserDto,
}

impl TokenDto {
    /// Convert into an issued session, anchoring expiry at `now`.
    pub fn into_issued_session(self, now: DateTime<Utc>) -> IssuedSession {
        let identity = Identity::from(self.user);
        let record = SessionRecord {
            user_id: identity.id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + Duration::seconds(self.expires_in),
        };
        IssuedSession { identity, record }
    }
}

/// Error body shape; the service is inconsistent about the field name.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBodyDto {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBodyDto {
    /// Best human-readable message the body offers.
    pub fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

#[cfg(test)]
mod tests {
    //! Decode and conversion coverage for the wire types.
    use super::*;

    #[test]
    fn token_response_converts_to_issued_session() {
        let body = r#"{
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "expires_in": 3600,
            "user": {
                "id": "6f02e1a0-0000-0000-0000-000000000001",
                "email": "jane.doe@example.com",
                "user_metadata": { "user_name": "janedoe" }
            }
        }"#;

        let dto: TokenDto = serde_json::from_str(body).expect("token body decodes");
        let now = Utc::now();
        let issued = dto.into_issued_session(now);

        assert_eq!(issued.identity.email, "jane.doe@example.com");
        assert_eq!(issued.identity.metadata.user_name(), Some("janedoe"));
        assert_eq!(issued.record.user_id, issued.identity.id);
        assert_eq!(issued.record.expires_at, now + Duration::seconds(3600));
        assert!(!issued.record.is_expired(now));
    }

    #[test]
    fn user_without_metadata_decodes() {
        let body = r#"{
            "id": "6f02e1a0-0000-0000-0000-000000000002",
            "email": "a@x.com"
        }"#;
        let dto: UserDto = serde_json::from_str(body).expect("user body decodes");
        let identity = Identity::from(dto);
        assert_eq!(identity.metadata.user_name(), None);
    }

    #[test]
    fn error_body_prefers_error_description() {
        let body = r#"{ "error_description": "Invalid login credentials", "msg": "other" }"#;
        let dto: ErrorBodyDto = serde_json::from_str(body).expect("error body decodes");
        assert_eq!(
            dto.into_message().as_deref(),
            Some("Invalid login credentials")
        );
    }

    #[test]
    fn unrecognised_error_body_yields_no_message() {
        let dto: ErrorBodyDto = serde_json::from_str("{}").expect("empty body decodes");
        assert!(dto.into_message().is_none());
    }
}
