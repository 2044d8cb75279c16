use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, SecurityConfig};
use crate::error::ApiError;

/// Authorization scopes carried in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authority {
    #[serde(rename = "SYS_ADMIN")]
    SysAdmin,
    #[serde(rename = "MEMBER_USER")]
    MemberUser,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::SysAdmin => "SYS_ADMIN",
            Authority::MemberUser => "MEMBER_USER",
        }
    }

    /// Scopes granted to a user holding this authority.
    pub fn granted_scopes(&self) -> Vec<String> {
        match self {
            Authority::SysAdmin => vec![Authority::SysAdmin.as_str().to_string(), Authority::MemberUser.as_str().to_string()],
            Authority::MemberUser => vec![Authority::MemberUser.as_str().to_string()],
        }
    }
}

impl FromStr for Authority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYS_ADMIN" => Ok(Authority::SysAdmin),
            "MEMBER_USER" => Ok(Authority::MemberUser),
            other => Err(format!("unknown authority '{}'", other)),
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    /// Email address of the user
    pub sub: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub account: String,
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// The user a token is issued for
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub email_address: String,
    pub account: String,
    pub user_id: Uuid,
    pub authority: Authority,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingToken(&'static str),

    #[error("Could not validate credentials")]
    InvalidCredentials,

    #[error("Not enough permissions")]
    InsufficientScope { required: Vec<String> },

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken(_) | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            AuthError::TokenGeneration(_) | AuthError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `WWW-Authenticate` challenge, naming the required scopes when there are any
    pub fn challenge(&self) -> String {
        let required = match self {
            AuthError::InsufficientScope { required } => required.as_slice(),
            _ => &[],
        };
        if required.is_empty() {
            "Bearer".to_string()
        } else {
            format!("Bearer scope=\"{}\"", required.join(" "))
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let api_error = match status {
            StatusCode::UNAUTHORIZED => ApiError::unauthorized(self.to_string()),
            StatusCode::FORBIDDEN => ApiError::forbidden(self.to_string()),
            _ => {
                tracing::error!("Authentication backend error: {}", self);
                ApiError::internal_server_error("Authentication is misconfigured")
            }
        };

        let mut response = (status, Json(api_error.to_json())).into_response();
        if status != StatusCode::INTERNAL_SERVER_ERROR {
            if let Ok(value) = HeaderValue::from_str(&self.challenge()) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

/// Sign an access token for `subject`. Falls back to the configured lifetime
/// when `expires_in` is `None`.
pub fn issue_access_token(
    subject: &TokenSubject,
    expires_in: Option<Duration>,
    security: &SecurityConfig,
) -> Result<String, AuthError> {
    let algorithm = security.algorithm()?;
    let issued = Utc::now();
    let expires = issued + expires_in.unwrap_or_else(|| Duration::minutes(security.access_token_expire_minutes));

    let claims = TokenData {
        sub: subject.email_address.clone(),
        scopes: subject.authority.granted_scopes(),
        account: subject.account.clone(),
        user_id: subject.user_id.to_string(),
        iat: issued.timestamp(),
        exp: expires.timestamp(),
    };

    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(security.secret_key.as_bytes()),
    )
    .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Verify signature, algorithm and expiry, and require a non-empty subject.
pub fn decode_token(token: &str, security: &SecurityConfig) -> Result<TokenData, AuthError> {
    let algorithm = security.algorithm()?;
    let validation = Validation::new(algorithm);

    let token_data = decode::<TokenData>(
        token,
        &DecodingKey::from_secret(security.secret_key.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Rejected access token: {}", e);
        AuthError::InvalidCredentials
    })?;

    if token_data.claims.sub.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(token_data.claims)
}

/// True when every expected scope is among the actual ones.
pub fn check_scopes(expected: &[Authority], actual: &[String]) -> bool {
    let actual: HashSet<&str> = actual.iter().map(String::as_str).collect();
    expected.iter().all(|scope| actual.contains(scope.as_str()))
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MissingToken("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::MissingToken("Empty bearer token")),
        None => Err(AuthError::MissingToken("Authorization header must use Bearer token format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn security() -> SecurityConfig {
        AppConfig::development().security
    }

    fn member() -> TokenSubject {
        TokenSubject {
            email_address: "member@group.com".to_string(),
            account: "member".to_string(),
            user_id: Uuid::new_v4(),
            authority: Authority::MemberUser,
        }
    }

    #[test]
    fn sys_admin_also_gets_member_scope() {
        let subject = TokenSubject {
            authority: Authority::SysAdmin,
            ..member()
        };
        let token = issue_access_token(&subject, None, &security()).unwrap();
        let claims = decode_token(&token, &security()).unwrap();

        assert_eq!(claims.sub, "member@group.com");
        assert_eq!(claims.scopes, vec!["SYS_ADMIN", "MEMBER_USER"]);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let expired = issue_access_token(&member(), Some(Duration::minutes(-10)), &security()).unwrap();
        assert!(matches!(decode_token(&expired, &security()), Err(AuthError::InvalidCredentials)));

        let mut other = security();
        other.secret_key = "another-secret".to_string();
        let foreign = issue_access_token(&member(), None, &other).unwrap();
        assert!(matches!(decode_token(&foreign, &security()), Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn scope_check_requires_every_expected_scope() {
        let actual = vec!["MEMBER_USER".to_string()];
        assert!(check_scopes(&[], &actual));
        assert!(check_scopes(&[Authority::MemberUser], &actual));
        assert!(!check_scopes(&[Authority::MemberUser, Authority::SysAdmin], &actual));
    }

    #[test]
    fn auth_errors_distinguish_401_from_403() {
        let err = decode_token("garbage", &security()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.challenge(), "Bearer");

        let err = AuthError::InsufficientScope {
            required: vec![Authority::SysAdmin.as_str().to_string()],
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.challenge(), "Bearer scope=\"SYS_ADMIN\"");
    }

    #[test]
    fn authority_parses_its_wire_name() {
        assert_eq!("SYS_ADMIN".parse::<Authority>().unwrap(), Authority::SysAdmin);
        assert_eq!("MEMBER_USER".parse::<Authority>().unwrap(), Authority::MemberUser);
        assert!("admin".parse::<Authority>().is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(extract_bearer(&headers), Err(AuthError::MissingToken(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(extract_bearer(&headers), Err(AuthError::MissingToken(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }
}
