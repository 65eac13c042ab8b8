use axum::{extract::FromRequestParts, http::request::Parts};
use service::Caller;

use crate::error::ApiError;

pub(crate) const USER_ID_HEADER: &str = "x-user-id";
pub(crate) const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller, as forwarded by the auth gateway.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurrentCaller(pub Caller);

impl<S> FromRequestParts<S> for CurrentCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))?
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or(ApiError::Unauthorized("malformed x-user-id header"))?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));

        Ok(Self(Caller { user_id, is_admin }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentCaller::from_request_parts(&mut parts, &())
            .await
            .map(|c| c.0)
    }

    #[tokio::test]
    async fn test_caller_from_headers() {
        assert_eq!(extract(&[("x-user-id", "7")]).await.unwrap(), Caller::user(7));
        assert_eq!(
            extract(&[("x-user-id", " 1 "), ("x-user-role", "Admin")]).await.unwrap(),
            Caller::admin(1)
        );
        assert_eq!(
            extract(&[("x-user-id", "2"), ("x-user-role", "customer")]).await.unwrap(),
            Caller::user(2)
        );
    }

    #[tokio::test]
    async fn test_missing_or_malformed_user_is_rejected() {
        assert!(matches!(extract(&[]).await, Err(ApiError::Unauthorized(_))));
        assert!(matches!(
            extract(&[("x-user-id", "abc")]).await,
            Err(ApiError::Unauthorized(_))
        ));
    }
}
