use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use whisper_types::api::Claims;

use crate::auth::{AppState, Identity};
use crate::error::ApiError;

/// Resolve the caller from an optional `Authorization: Bearer` header.
/// No header means anonymous; a header that does not verify is rejected.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match req.headers().get(header::AUTHORIZATION) {
        None => Identity::Anonymous,
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(ApiError::Unauthorized)?;

            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
                &Validation::default(),
            )
            .map_err(|_| ApiError::Unauthorized)?;

            Identity::from_claims(&token_data.claims)
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
