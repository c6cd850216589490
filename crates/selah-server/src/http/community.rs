use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use selah_model::{
    activity_window_days, tally_votes, Community, CommunityKind, MembershipRole, PollConfig,
    PostBody, PostKind, SizeBucket,
};

use crate::error::{ApiError, ApiResult};
use crate::http::ok_body;
use crate::middleware::{CurrentSession, CurrentUser};
use crate::store::{DiscoverFilter, PostWithAuthor, ReplyWithAuthor};
use crate::AppState;

const HERO_IMAGE_FIELD: &str = "heroImage";

fn community_json(community: &Community, role: Option<MembershipRole>, my: bool) -> Value {
    json!({
        "id": community.id,
        "header": community.header,
        "subheader": community.subheader,
        "content": community.content,
        "type": community.kind.as_str(),
        "members": community.members_count,
        "lastActivityAt": community.last_activity_at.to_rfc3339(),
        "heroImage": community.hero_image_path,
        "role": role.map(MembershipRole::as_str),
        "my": my,
    })
}

fn post_list_json(row: &PostWithAuthor) -> Value {
    json!({
        "id": row.post.id,
        "title": row.post.title,
        "subtitle": row.post.subtitle(),
        "category": row.post.body.category(),
        "type": row.post.body.kind_str(),
        "replyCount": row.post.reply_count,
        "lastReplyAt": row.post.last_reply_at.map(|dt| dt.to_rfc3339()),
        "createdAt": row.post.created_at.to_rfc3339(),
        "author": row.author_name,
    })
}

fn reply_json(row: &ReplyWithAuthor) -> Value {
    json!({
        "id": row.reply.id,
        "parentId": row.reply.parent_id,
        "body": row.reply.body,
        "createdAt": row.reply.created_at.to_rfc3339(),
        "author": row.author_name,
    })
}

async fn load_community(state: &AppState, id: i64) -> ApiResult<Community> {
    state
        .store
        .get_community(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Community not found"))
}

async fn require_role(
    state: &AppState,
    user_id: i64,
    community_id: i64,
) -> ApiResult<MembershipRole> {
    state
        .store
        .membership_role(user_id, community_id)
        .await?
        .ok_or_else(|| ApiError::Authorization("Not a community member".to_string()))
}

async fn display_name_of(state: &AppState, user_id: i64, fallback: &str) -> ApiResult<String> {
    Ok(state
        .store
        .get_user(user_id)
        .await?
        .map(|user| user.display_name())
        .unwrap_or_else(|| fallback.to_string()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCommunityRequest {
    #[serde(default)]
    header: String,
    #[serde(default)]
    subheader: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "type")]
    kind: String,
}

pub(crate) async fn create_community(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateCommunityRequest>,
) -> ApiResult<Response> {
    let header = req.header.trim().to_string();
    let subheader = req.subheader.trim().to_string();
    let content = req.content.trim().to_string();
    if header.is_empty() || subheader.is_empty() || content.is_empty() || req.kind.is_empty() {
        return Err(ApiError::validation("Missing required fields"));
    }
    let kind = CommunityKind::parse(&req.kind)
        .ok_or_else(|| ApiError::validation("Invalid community type"))?;

    let community = state
        .store
        .create_community(user_id, header, subheader, content, kind)
        .await?;
    info!(community_id = community.id, user_id, "community created");

    Ok((
        StatusCode::CREATED,
        ok_body(json!({
            "community": community_json(&community, Some(MembershipRole::Owner), true),
        })),
    )
        .into_response())
}

pub(crate) async fn my_communities(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let rows = state.store.my_communities(user_id).await?;
    let communities: Vec<Value> = rows
        .iter()
        .map(|(community, role)| community_json(community, Some(*role), true))
        .collect();
    Ok(ok_body(json!({ "communities": communities })).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiscoverParams {
    q: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    size: Option<String>,
    activity: Option<String>,
}

pub(crate) async fn discover(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Query(params): Query<DiscoverParams>,
) -> ApiResult<Response> {
    let filter = DiscoverFilter {
        q: params
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty()),
        kind: params.kind.as_deref().and_then(CommunityKind::parse),
        size: params.size.as_deref().and_then(SizeBucket::parse),
        activity_days: params.activity.as_deref().and_then(activity_window_days),
        exclude_user: session.0,
    };
    let rows = state.store.discover_communities(filter).await?;
    let communities: Vec<Value> = rows
        .iter()
        .map(|community| community_json(community, None, false))
        .collect();
    Ok(ok_body(json!({ "communities": communities })).into_response())
}

pub(crate) async fn community_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let detail = state
        .store
        .community_detail(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Community not found"))?;

    let leaders: Vec<Value> = detail
        .members
        .iter()
        .filter(|m| m.role == MembershipRole::Leader)
        .map(|m| json!(m.user))
        .collect();
    let members: Vec<Value> = detail
        .members
        .iter()
        .map(|m| {
            json!({
                "user": m.user,
                "role": m.role.as_str(),
            })
        })
        .collect();

    let mut body = community_json(&detail.community, None, false);
    if let Value::Object(fields) = &mut body {
        fields.insert("owner".to_string(), json!(detail.owner));
        fields.insert("leaders".to_string(), Value::Array(leaders));
        fields.insert("membersList".to_string(), Value::Array(members));
    }
    Ok(ok_body(json!({ "community": body })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InviteRequest {
    user_id: Option<i64>,
}

pub(crate) async fn invite(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Response> {
    let community = load_community(&state, id).await?;
    let role = require_role(&state, user_id, id).await?;
    if !role.can_manage() {
        return Err(ApiError::Authorization(
            "Only owners or leaders can invite".to_string(),
        ));
    }
    let invitee_id = req
        .user_id
        .ok_or_else(|| ApiError::validation("Missing userId"))?;
    let invitee = state
        .store
        .get_user(invitee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User to invite not found"))?;

    let inviter_name = display_name_of(&state, user_id, "Someone").await?;
    let message = format!(
        "{inviter_name} has invited you to join {}.",
        community.header
    );
    state
        .store
        .create_notification(
            invitee.id,
            selah_model::NotificationKind::CommunityInvite,
            message,
            Some(community.id),
            Some(user_id),
            None,
        )
        .await?;
    Ok(ok_body(json!({})).into_response())
}

pub(crate) async fn request_join(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let community = load_community(&state, id).await?;
    let requester_name = display_name_of(&state, user_id, "A user").await?;
    let message = format!(
        "{requester_name} has requested to join {}.",
        community.header
    );
    state
        .store
        .create_notification(
            community.owner_id,
            selah_model::NotificationKind::CommunityJoinRequest,
            message,
            Some(community.id),
            Some(user_id),
            None,
        )
        .await?;
    Ok(ok_body(json!({})).into_response())
}

fn image_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

pub(crate) async fn upload_hero_image(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    load_community(&state, id).await?;
    let role = require_role(&state, user_id, id).await?;
    if !role.can_manage() {
        return Err(ApiError::Authorization(
            "Only owners or leaders can change the hero image".to_string(),
        ));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::validation(err.to_string()))?
    {
        if field.name() != Some(HERO_IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::validation("Only image uploads are accepted"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::validation(err.to_string()))?;
        if bytes.len() > state.config.max_upload_bytes {
            return Err(ApiError::validation("Image exceeds the 5 MB limit"));
        }

        let mut suffix = [0u8; 8];
        OsRng.fill_bytes(&mut suffix);
        let file_name = format!(
            "community-{id}-{}.{}",
            hex::encode(suffix),
            image_extension(&content_type)
        );
        let target = state.config.uploads_dir.join(&file_name);
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|err| ApiError::Internal(Box::new(err)))?;

        let public_path = format!("/uploads/{file_name}");
        state.store.set_hero_image(id, public_path.clone()).await?;
        info!(community_id = id, path = %public_path, "hero image updated");
        return Ok(ok_body(json!({ "heroImage": public_path })).into_response());
    }
    Err(ApiError::validation("Missing heroImage file field"))
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    load_community(&state, id).await?;
    let rows = state.store.list_posts(id).await?;
    let posts: Vec<Value> = rows.iter().map(post_list_json).collect();
    Ok(ok_body(json!({ "posts": posts })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatePostRequest {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    allow_multiple: bool,
    anonymous: Option<bool>,
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<Response> {
    let community = load_community(&state, id).await?;
    require_role(&state, user_id, id).await?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("Title required"));
    }

    let body = if req.kind == "poll" {
        let options = PollConfig::clean_options(req.options);
        if options.len() < 2 {
            return Err(ApiError::validation("A poll needs at least two options"));
        }
        PostBody::Poll(PollConfig {
            options,
            allow_multiple: req.allow_multiple,
            anonymous: req.anonymous.unwrap_or(true),
        })
    } else {
        let text = req.body.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::validation("Body required"));
        }
        // Unrecognized kinds fall back to general.
        let kind = PostKind::parse(&req.kind).unwrap_or(PostKind::General);
        PostBody::Text { kind, body: text }
    };

    let post_id = state.store.create_post(id, user_id, title, body).await?;
    fan_out_new_post(&state, &community, post_id, user_id).await;

    let row = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    Ok((
        StatusCode::CREATED,
        ok_body(json!({ "post": post_list_json(&row) })),
    )
        .into_response())
}

/// Notify Owner/Leader members about a new post. Failures are logged
/// and swallowed so the post creation itself never rolls back.
pub(crate) async fn fan_out_new_post(
    state: &AppState,
    community: &Community,
    post_id: i64,
    author_id: i64,
) {
    let author_name = match display_name_of(state, author_id, "Someone").await {
        Ok(name) => name,
        Err(err) => {
            warn!(post_id, error = %err, "new-post fan-out skipped");
            return;
        }
    };
    let mut recipients = match state.store.manager_ids(community.id).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(post_id, error = %err, "new-post fan-out skipped");
            return;
        }
    };
    recipients.sort_unstable();
    recipients.dedup();
    let message = format!("{author_name} posted in {}.", community.header);
    for recipient in recipients {
        if recipient == author_id {
            continue;
        }
        if let Err(err) = state
            .store
            .create_notification(
                recipient,
                selah_model::NotificationKind::CommunityNewPost,
                message.clone(),
                Some(community.id),
                Some(author_id),
                Some(post_id),
            )
            .await
        {
            warn!(post_id, recipient, error = %err, "new-post notification failed");
        }
    }
}

async fn load_post(state: &AppState, community_id: i64, post_id: i64) -> ApiResult<PostWithAuthor> {
    let row = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    if row.post.community_id != community_id {
        return Err(ApiError::not_found("Post not found"));
    }
    Ok(row)
}

fn poll_json(cfg: &PollConfig, all_votes: Vec<usize>, own_picks: Vec<usize>) -> Value {
    let tally = tally_votes(cfg.options.len(), all_votes);
    let my_votes: Vec<usize> = own_picks
        .into_iter()
        .filter(|idx| *idx < cfg.options.len())
        .collect();
    json!({
        "options": cfg.options.iter().map(|o| o.text.clone()).collect::<Vec<_>>(),
        "allowMultiple": cfg.allow_multiple,
        "anonymous": cfg.anonymous,
        "counts": tally.counts,
        "total": tally.total,
        "myVotes": my_votes,
    })
}

pub(crate) async fn post_detail(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, post_id)): Path<(i64, i64)>,
) -> ApiResult<Response> {
    let row = load_post(&state, id, post_id).await?;
    let mut body = post_list_json(&row);
    if let Value::Object(fields) = &mut body {
        if let PostBody::Text { body: text, .. } = &row.post.body {
            fields.insert("body".to_string(), json!(text));
        }
        if let Some(cfg) = row.post.body.poll() {
            let poll = state.store.poll_state(post_id, user_id).await?;
            fields.insert(
                "poll".to_string(),
                poll_json(cfg, poll.all_votes, poll.own_picks),
            );
        }
    }
    Ok(ok_body(json!({ "post": body })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoteRequest {
    option_index: Option<usize>,
}

pub(crate) async fn vote(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, post_id)): Path<(i64, i64)>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Response> {
    require_role(&state, user_id, id).await?;
    let row = load_post(&state, id, post_id).await?;
    let cfg = row
        .post
        .body
        .poll()
        .ok_or_else(|| ApiError::validation("Not a poll post"))?;
    let option_index = req
        .option_index
        .ok_or_else(|| ApiError::validation("Missing optionIndex"))?;
    if option_index >= cfg.options.len() {
        return Err(ApiError::validation("Invalid option index"));
    }

    state
        .store
        .toggle_vote(post_id, user_id, option_index, cfg.allow_multiple)
        .await?;
    state.store.touch_community_activity(id).await?;

    let poll = state.store.poll_state(post_id, user_id).await?;
    Ok(ok_body(json!({ "poll": poll_json(cfg, poll.all_votes, poll.own_picks) })).into_response())
}

pub(crate) async fn list_replies(
    State(state): State<AppState>,
    Path((id, post_id)): Path<(i64, i64)>,
) -> ApiResult<Response> {
    load_post(&state, id, post_id).await?;
    let rows = state.store.list_replies(post_id).await?;
    let replies: Vec<Value> = rows.iter().map(reply_json).collect();
    Ok(ok_body(json!({ "replies": replies })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateReplyRequest {
    #[serde(default)]
    body: String,
    parent_id: Option<i64>,
}

pub(crate) async fn create_reply(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, post_id)): Path<(i64, i64)>,
    Json(req): Json<CreateReplyRequest>,
) -> ApiResult<Response> {
    require_role(&state, user_id, id).await?;
    load_post(&state, id, post_id).await?;

    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::validation("Reply body required"));
    }
    if let Some(parent_id) = req.parent_id {
        let parent_post = state
            .store
            .reply_post_id(parent_id)
            .await?
            .ok_or_else(|| ApiError::validation("Parent reply not found"))?;
        if parent_post != post_id {
            return Err(ApiError::validation(
                "Parent reply does not belong to this post",
            ));
        }
    }

    let reply_id = state
        .store
        .create_reply(post_id, req.parent_id, user_id, body)
        .await?;
    Ok((
        StatusCode::CREATED,
        ok_body(json!({ "replyId": reply_id })),
    )
        .into_response())
}
