use axum::{
    extract::{Path, State},
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entities::notification;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;
use crate::AppState;

/// List the caller's notifications, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<notification::Model>>> {
    let items = notification::Entity::find()
        .filter(notification::Column::UserId.eq(claims.sub))
        .order_by_desc(notification::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(items))
}

/// Mark one of the caller's notifications as read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<notification::Model>> {
    let found = notification::Entity::find_by_id(notification_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    if found.user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only update your own notifications".to_string(),
        ));
    }

    let mut active: notification::ActiveModel = found.into();
    active.read = Set(true);
    Ok(Json(active.update(&state.db).await?))
}
