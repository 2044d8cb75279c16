use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{check_scopes, decode_token, extract_bearer, AuthError, Authority, TokenData};

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub email_address: String,
    pub account: String,
    pub user_id: String,
    pub scopes: Vec<String>,
}

impl From<TokenData> for AuthUser {
    fn from(claims: TokenData) -> Self {
        Self {
            email_address: claims.sub,
            account: claims.account,
            user_id: claims.user_id,
            scopes: claims.scopes,
        }
    }
}

impl AuthUser {
    /// Require every scope in `expected`; 403 with a scope challenge otherwise
    pub fn require(&self, expected: &[Authority]) -> Result<(), AuthError> {
        if check_scopes(expected, &self.scopes) {
            return Ok(());
        }
        tracing::warn!(account = %self.account, required = ?expected, "Insufficient scopes");
        Err(AuthError::InsufficientScope {
            required: expected.iter().map(|a| a.as_str().to_string()).collect(),
        })
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = {
        let token = extract_bearer(request.headers())?;
        decode_token(token, &state.config.security)?
    };

    // Convert claims to AuthUser and inject into request
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}
