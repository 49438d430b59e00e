//! Caller identity as forwarded by the authentication layer in front of
//! this service.

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::{error::ServiceError, models::Actor, models::UserId};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ADMIN_HEADER: &str = "X-User-Admin";

/// The caller of a request; `None` for anonymous requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Option<Actor>);

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServiceError> {
        let id = match headers.get(USER_ID_HEADER) {
            None => return Ok(Caller(None)),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<UserId>().ok())
                .ok_or(ServiceError::Unauthorized)?,
        };
        let is_admin = headers
            .get(ADMIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.trim().eq_ignore_ascii_case("true"));
        Ok(Caller(Some(Actor { id, is_admin })))
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.0.map(|actor| actor.id)
    }

    /// The actor, or `Unauthorized` for anonymous callers.
    pub fn require(&self) -> Result<Actor, ServiceError> {
        self.0.ok_or(ServiceError::Unauthorized)
    }
}

impl FromRequest for Caller {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Caller::from_headers(req.headers()))
    }
}
