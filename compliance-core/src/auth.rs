//! Session gate run before the console loads any data

use tracing::info;

use crate::api::RequirementsApi;
use crate::config::ConsoleContext;
use crate::error::ApiResult;
use crate::host::Navigator;
use crate::models::Profile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(Profile),
    /// No session; the navigator was sent to the login surface
    Redirected,
}

/// Checks the session with `/auth/me`. A 401 redirects instead of failing;
/// other errors are returned to the caller.
pub async fn ensure_session<A, N>(
    api: &A,
    navigator: &N,
    context: &ConsoleContext,
) -> ApiResult<SessionState>
where
    A: RequirementsApi + ?Sized,
    N: Navigator + ?Sized,
{
    match api.current_profile().await {
        Ok(profile) => {
            if context.actor().is_none() {
                context.set_actor(profile.actor());
            }
            Ok(SessionState::Authenticated(profile))
        }
        Err(err) if err.is_unauthenticated() => {
            info!("No active session, redirecting to login");
            navigator.redirect_to_login();
            Ok(SessionState::Redirected)
        }
        Err(err) => Err(err),
    }
}
