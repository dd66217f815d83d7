//! Token authentication middleware
//!
//! Every OCPI call carries `Authorization: Token <token>`. The token is
//! resolved to the calling platform (token A before registration, token B
//! afterwards) and attached to the request as [`Caller`].

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, Span};

use super::common::{ApiError, OcpiResponse};
use super::router::AppState;
use crate::shared::ocpi_status::OcpiStatus;
use crate::shared::token::parse_authorization;

/// Platform that presented the request token
#[derive(Clone, Debug)]
pub struct Caller {
    pub platform_id: String,
    /// Token as matched against the registry
    pub token: String,
}

fn unauthorized() -> Response {
    let body = OcpiResponse::error(OcpiStatus::CLIENT_ERROR, "authentication failed");
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

pub async fn token_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(candidates) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_authorization)
    else {
        return unauthorized();
    };

    for token in candidates {
        match state.repos.platforms().find_by_token(&token).await {
            Ok(Some(platform)) => {
                debug!(platform_id = %platform.id, "Caller authenticated");
                Span::current().record("platform_id", platform.id.as_str());
                request.extensions_mut().insert(Caller {
                    platform_id: platform.id,
                    token,
                });
                return next.run(request).await;
            }
            Ok(None) => continue,
            Err(e) => return ApiError(e).into_response(),
        }
    }
    unauthorized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{middleware, Extension, Router};
    use tower::ServiceExt;

    use crate::application::testing::fixtures::connected_platform;
    use crate::interfaces::http::router::tests::test_state;

    async fn whoami(Extension(caller): Extension<Caller>) -> String {
        caller.platform_id
    }

    async fn call(authorization: Option<&str>) -> Response {
        let (state, _) = test_state().await;
        state
            .repos
            .platforms()
            .save(connected_platform("P1"))
            .await
            .unwrap();
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), token_auth_middleware))
            .with_state(state);

        let mut request = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn raw_and_base64_tokens_resolve_the_caller() {
        assert_eq!(call(Some("Token p1-token-b")).await.status(), StatusCode::OK);
        // base64("p1-token-b")
        assert_eq!(call(Some("Token cDEtdG9rZW4tYg==")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_or_missing_tokens_are_rejected() {
        assert_eq!(call(Some("Token nope")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(Some("Bearer p1-token-b")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(None).await.status(), StatusCode::UNAUTHORIZED);
    }
}
