use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{User, UserStatus},
    error::AppError,
};

/// Authentication lives upstream (the API gateway); requests reach the
/// engine with a trusted `X-Actor-Id` header naming the acting user. This
/// middleware resolves it against the directory and refuses suspended
/// accounts.
#[derive(Clone)]
pub struct CurrentActor {
    pub user: User,
}

pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let actor_id = request
        .headers()
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .service_context
        .users
        .find_by_id(actor_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.status != UserStatus::Active {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentActor { user });

    Ok(next.run(request).await)
}
