//! Actor extractor for Axum handlers.
//!
//! Authentication happens upstream (the gateway in front of this service).
//! The gateway forwards the authenticated user name and role in the
//! `x-actor-id` and `x-actor-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use sitecheck_core::workflow::{Actor, ActorRole};

use crate::error::AppError;

pub const ACTOR_ID_HEADER: HeaderName = HeaderName::from_static("x-actor-id");
pub const ACTOR_ROLE_HEADER: HeaderName = HeaderName::from_static("x-actor-role");

/// The user performing the request.
///
/// ```ignore
/// async fn my_handler(RequestActor(actor): RequestActor) -> AppResult<Json<()>> {
///     tracing::info!(actor = %actor.name, role = actor.role.as_str(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &HeaderName) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = header(parts, &ACTOR_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing x-actor-id header".into()))?;
        let role = header(parts, &ACTOR_ROLE_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing x-actor-role header".into()))?;
        let role = ActorRole::from_str_db(role)?;

        Ok(RequestActor(Actor::new(name, role)))
    }
}
