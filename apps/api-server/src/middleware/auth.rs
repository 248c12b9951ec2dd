//! Caller extraction from bearer tokens.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use std::future::{Ready, ready};

use promptly_core::domain::{Caller, Identity};
use promptly_core::ports::AuthError;
use promptly_shared::ErrorResponse;

use crate::state::AppState;

/// The caller behind a request.
///
/// A request without an `Authorization` header is anonymous; reads accept
/// it and mutations reject it further down. A header that is present but
/// does not verify is refused here with 401.
#[derive(Debug, Clone)]
pub struct CurrentCaller(pub Caller);

impl CurrentCaller {
    pub fn caller(&self) -> &Caller {
        &self.0
    }
}

/// Error type for authentication failures.
#[derive(Debug)]
pub struct AuthenticationError(pub AuthError);

impl std::fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl actix_web::ResponseError for AuthenticationError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        let error = match &self.0 {
            AuthError::TokenExpired => ErrorResponse::new(401, "Token Expired")
                .with_detail("Your identity token has expired. Please sign in again."),
            AuthError::InvalidToken(msg) => {
                ErrorResponse::new(401, "Invalid Token").with_detail(msg.clone())
            }
            AuthError::MissingAuth => ErrorResponse::new(401, "Authentication Required")
                .with_detail("Please provide a valid Bearer token in the Authorization header."),
        };

        actix_web::HttpResponse::build(self.status_code()).json(error)
    }
}

impl FromRequest for CurrentCaller {
    type Error = AuthenticationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve_caller(req).map(CurrentCaller))
    }
}

fn resolve_caller(req: &HttpRequest) -> Result<Caller, AuthenticationError> {
    let Some(auth_header) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(Caller::Anonymous);
    };

    let auth_str = auth_header.to_str().map_err(|_| {
        AuthenticationError(AuthError::InvalidToken(
            "Invalid authorization header".to_string(),
        ))
    })?;

    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        AuthenticationError(AuthError::InvalidToken(
            "Expected Bearer token".to_string(),
        ))
    })?;

    let Some(tokens) = req
        .app_data::<web::Data<AppState>>()
        .and_then(|state| state.tokens.clone())
    else {
        tracing::warn!("Bearer token presented but no token service is configured");
        return Err(AuthenticationError(AuthError::InvalidToken(
            "Token verification is not available".to_string(),
        )));
    };

    let claims = tokens.validate_token(token).map_err(AuthenticationError)?;
    Ok(Caller::User(Identity::from(claims)))
}

/// `User-Agent` of the request, recorded as the activity device.
pub fn device(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
