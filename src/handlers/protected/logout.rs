// handlers/protected/logout.rs - POST /v1/auth/logout
//
// Tokens are stateless, so logging out is the client discarding its token.
// This endpoint only records the event in the audit log.

use axum::Extension;

use crate::middleware::{ApiResponse, AuthUser, BaseResponse};

pub async fn logout(Extension(user): Extension<AuthUser>) -> ApiResponse<BaseResponse> {
    tracing::info!(user_id = %user.user_id, email = %user.email_address, "{} logged out.", user.account);
    ApiResponse::success(BaseResponse::default())
}
