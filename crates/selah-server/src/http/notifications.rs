use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use selah_model::{
    MembershipRole, Notification, NotificationAction, NotificationKind, NotificationStatus,
};

use crate::error::{ApiError, ApiResult};
use crate::http::ok_body;
use crate::middleware::CurrentUser;
use crate::AppState;

fn notification_json(n: &Notification) -> Value {
    json!({
        "id": n.id,
        "type": n.kind.as_str(),
        "message": n.message,
        "communityId": n.community_id,
        "actorId": n.actor_id,
        "postId": n.post_id,
        "status": n.status.as_str(),
        "readAt": n.read_at.map(|dt| dt.to_rfc3339()),
        "createdAt": n.created_at.to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    unread: Option<String>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let unread_only = params.unread.as_deref() == Some("true");
    let rows = state.store.list_notifications(user_id, unread_only).await?;
    let notifications: Vec<Value> = rows.iter().map(notification_json).collect();
    Ok(ok_body(json!({ "notifications": notifications })).into_response())
}

pub(crate) async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let updated = state.store.mark_notification_read(user_id, id).await?;
    if !updated {
        return Err(ApiError::not_found("Notification not found"));
    }
    let notification = state
        .store
        .get_notification(user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(ok_body(json!({ "notification": notification_json(&notification) })).into_response())
}

pub(crate) async fn mark_all_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let updated = state.store.mark_all_notifications_read(user_id).await?;
    Ok(ok_body(json!({ "updated": updated })).into_response())
}

pub(crate) async fn delete_one(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    if !state.store.delete_notification(user_id, id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(ok_body(json!({})).into_response())
}

pub(crate) async fn delete_all(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let deleted = state.store.delete_all_notifications(user_id).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("No notifications to delete"));
    }
    Ok(ok_body(json!({ "deleted": deleted })).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActRequest {
    #[serde(default)]
    action: String,
}

pub(crate) async fn act(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ActRequest>,
) -> ApiResult<Response> {
    let action = NotificationAction::parse(&req.action)
        .ok_or_else(|| ApiError::validation("Invalid action"))?;
    let notification = apply_notification_action(&state, user_id, id, action).await?;
    Ok(ok_body(json!({ "notification": notification_json(&notification) })).into_response())
}

/// Accept/decline workflow for invites and join requests. Membership
/// insertion is idempotent; the community counter only moves when a
/// membership row was actually created.
pub(crate) async fn apply_notification_action(
    state: &AppState,
    user_id: i64,
    notification_id: i64,
    action: NotificationAction,
) -> ApiResult<Notification> {
    let notification = state
        .store
        .get_notification(user_id, notification_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if !notification.kind.is_actionable() {
        return Err(ApiError::validation("Notification is not actionable"));
    }
    if notification.status != NotificationStatus::Pending {
        return Err(ApiError::Conflict(
            "Notification already handled".to_string(),
        ));
    }

    let community_id = notification
        .community_id
        .ok_or_else(|| ApiError::validation("Notification has no community"))?;
    let Some(community) = state.store.get_community(community_id).await? else {
        // The community vanished; close the notification out.
        state
            .store
            .set_notification_status(notification.id, NotificationStatus::Declined)
            .await?;
        return Err(ApiError::not_found("Community no longer exists"));
    };

    if action == NotificationAction::Accept {
        match notification.kind {
            NotificationKind::CommunityJoinRequest => {
                let requester = notification
                    .actor_id
                    .ok_or_else(|| ApiError::validation("Notification has no requester"))?;
                let inserted = state
                    .store
                    .add_member(requester, community_id, MembershipRole::Member)
                    .await?;
                if inserted {
                    info!(community_id, requester, "join request accepted");
                }
                let message = format!("Your request to join {} was accepted.", community.header);
                state
                    .store
                    .create_notification(
                        requester,
                        NotificationKind::CommunityInvite,
                        message,
                        Some(community_id),
                        Some(user_id),
                        None,
                    )
                    .await?;
            }
            NotificationKind::CommunityInvite => {
                let inserted = state
                    .store
                    .add_member(user_id, community_id, MembershipRole::Member)
                    .await?;
                if inserted {
                    info!(community_id, user_id, "invite accepted");
                }
            }
            NotificationKind::CommunityNewPost => {
                return Err(ApiError::validation("Notification is not actionable"));
            }
        }
    }

    let status = match action {
        NotificationAction::Accept => NotificationStatus::Accepted,
        NotificationAction::Decline => NotificationStatus::Declined,
    };
    state
        .store
        .set_notification_status(notification.id, status)
        .await?;

    state
        .store
        .get_notification(user_id, notification_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))
}
