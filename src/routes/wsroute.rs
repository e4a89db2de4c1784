//! WebSocket upgrade handlers.
//!
//! Every handler walks the same ladder: authenticate the caller (401 on
//! failure, before anything about the room is revealed), authorize them
//! for the specific room (403/404), then register a subscriber and start
//! the session actor. Rejected callers never learn room state.

use crate::error::AppError;
use crate::middleware::auth;
use crate::models::room::Room;
use crate::state::AppState;
use crate::websocket::session::{Frame, RoomSession, SessionAuthz};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

fn reject(err: AppError) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(err.status_code())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).finish()
}

/// Register the subscriber, start the session actor, and bridge broadcast
/// frames from the registry channel into the actor's socket.
async fn start_session(
    req: &HttpRequest,
    payload: web::Payload,
    state: &AppState,
    room: Room,
    user_id: Uuid,
    authz: SessionAuthz,
) -> Result<HttpResponse, Error> {
    let (subscriber_id, mut rx) = state.registry.add_subscriber(&room.key()).await;

    let session = RoomSession::new(room, user_id, authz, subscriber_id, state.clone());
    let (addr, resp) = ws::WsResponseBuilder::new(session, req, payload).start_with_addr()?;

    // The channel sender is dropped when the session unsubscribes, which
    // ends this forwarder with it.
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            addr.do_send(Frame(frame));
        }
    });

    Ok(resp)
}

/// `GET /ws/streams/{stream_id}`: live stream room.
pub async fn stream_ws(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth::authenticate(&req, query.token.as_deref(), &state.config.jwt_secret)
    {
        Ok(user_id) => user_id,
        Err(e) => return Ok(reject(e)),
    };

    let stream_id = path.into_inner();
    let stream = match state.streams.get(stream_id).await {
        Ok(Some(stream)) => stream,
        Ok(None) => return Ok(reject(AppError::NotFound)),
        Err(e) => return Ok(reject(e)),
    };

    match state.streams.can_view(&stream, user_id).await {
        Ok(true) => {}
        Ok(false) => {
            return Ok(reject(AppError::Forbidden(
                "not permitted to view this stream".into(),
            )))
        }
        Err(e) => return Ok(reject(e)),
    }

    let room = Room::Stream(stream_id);

    // An active ban blocks the join itself, not just posting.
    match state.bans.is_banned(&room, user_id).await {
        Ok(true) => {
            return Ok(reject(AppError::Forbidden(
                "banned from this stream".into(),
            )))
        }
        Ok(false) => {}
        Err(e) => return Ok(reject(e)),
    }

    let is_owner = stream.owner_id == user_id;
    let is_moderator = state
        .presence
        .is_moderator(&room, user_id)
        .await
        .unwrap_or(false);

    start_session(
        &req,
        payload,
        &state,
        room,
        user_id,
        SessionAuthz {
            is_owner,
            is_moderator,
        },
    )
    .await
}

/// `GET /ws/posts/{post_id}`: live comments under a post.
pub async fn comments_ws(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth::authenticate(&req, query.token.as_deref(), &state.config.jwt_secret)
    {
        Ok(user_id) => user_id,
        Err(e) => return Ok(reject(e)),
    };

    let post_id = path.into_inner();
    let author = match state.conversations.post_author(post_id).await {
        Ok(Some(author)) => author,
        Ok(None) => return Ok(reject(AppError::NotFound)),
        Err(e) => return Ok(reject(e)),
    };

    start_session(
        &req,
        payload,
        &state,
        Room::Post(post_id),
        user_id,
        SessionAuthz {
            is_owner: author == user_id,
            is_moderator: false,
        },
    )
    .await
}

/// `GET /ws/conversations/{conversation_id}`: group conversation.
pub async fn conversation_ws(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth::authenticate(&req, query.token.as_deref(), &state.config.jwt_secret)
    {
        Ok(user_id) => user_id,
        Err(e) => return Ok(reject(e)),
    };

    let conversation_id = path.into_inner();
    match state.conversations.is_member(conversation_id, user_id).await {
        Ok(true) => {}
        Ok(false) => {
            return Ok(reject(AppError::Forbidden(
                "not a conversation participant".into(),
            )))
        }
        Err(e) => return Ok(reject(e)),
    }

    start_session(
        &req,
        payload,
        &state,
        Room::Conversation(conversation_id),
        user_id,
        SessionAuthz::default(),
    )
    .await
}

/// `GET /ws/dm/{other_user_id}`: direct messages. Both sides derive the
/// same room regardless of who connects.
pub async fn direct_ws(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth::authenticate(&req, query.token.as_deref(), &state.config.jwt_secret)
    {
        Ok(user_id) => user_id,
        Err(e) => return Ok(reject(e)),
    };

    let other_user_id = path.into_inner();
    if other_user_id == user_id {
        return Ok(reject(AppError::BadRequest(
            "cannot open a direct room with yourself".into(),
        )));
    }

    let exists: bool = match sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(other_user_id)
        .fetch_one(&state.db)
        .await
    {
        Ok(exists) => exists,
        Err(e) => return Ok(reject(e.into())),
    };
    if !exists {
        return Ok(reject(AppError::NotFound));
    }

    start_session(
        &req,
        payload,
        &state,
        Room::direct(user_id, other_user_id),
        user_id,
        SessionAuthz::default(),
    )
    .await
}

/// `GET /ws/inbox`: the caller's personal notification channel. Only
/// your own inbox exists; the room is derived from the authenticated id.
pub async fn inbox_ws(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth::authenticate(&req, query.token.as_deref(), &state.config.jwt_secret)
    {
        Ok(user_id) => user_id,
        Err(e) => return Ok(reject(e)),
    };

    start_session(
        &req,
        payload,
        &state,
        Room::User(user_id),
        user_id,
        SessionAuthz::default(),
    )
    .await
}
