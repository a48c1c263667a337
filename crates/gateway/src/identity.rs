//! Request identity
//!
//! The gateway sits behind an SSO proxy that authenticates users and
//! forwards the login in `X-Remote-User` (and optionally a display name
//! in `X-Remote-User-Name`). Requests without the header are anonymous.
//! Admin and harvest roles come from repository configuration.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use openrepo_common::auth::Caller;
use std::convert::Infallible;

use crate::AppState;

pub const REMOTE_USER_HEADER: &str = "x-remote-user";
pub const REMOTE_USER_NAME_HEADER: &str = "x-remote-user-name";

/// Extracts the [`Caller`] a request acts as.
#[derive(Debug, Clone)]
pub struct Identity(pub Caller);

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Infallible> {
        let login = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let caller = match login {
            Some(login) => {
                let display_name = parts
                    .headers
                    .get(REMOTE_USER_NAME_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                let mut caller = Caller::user(login);
                caller.display_name = display_name;
                caller.with_roles(&state.config.repository)
            }
            None => Caller::anonymous(),
        };

        Ok(Identity(caller))
    }
}
