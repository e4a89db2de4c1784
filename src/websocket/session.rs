//! WebSocket session actor.
//!
//! One actor type serves every room kind: stream chat, post comments,
//! group conversations, direct messages and the personal inbox. By the
//! time the actor starts, the connection is authenticated and authorized;
//! the actor joins presence, replays a short backlog, then dispatches
//! inbound events to the engines and broadcasts the results through the
//! fan-out bus. Teardown (graceful or abrupt) releases the subscription
//! and the presence row.

use crate::error::AppError;
use crate::models::message::RoomMessage;
use crate::models::notification::NotificationKind;
use crate::models::reaction::{ReactionKind, ReactionTarget};
use crate::models::room::{Room, RoomKind};
use crate::services::notifications::preview;
use crate::services::{extract_mentions, ConversationService};
use crate::state::AppState;
use crate::websocket::events::{Inbound, MessagePayload, Outbound, StreamControlAction};
use crate::websocket::fanout::Scope;
use crate::websocket::SubscriberId;
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
/// How often socket-level liveness (pings, traffic) is folded back into
/// the participant's `last_activity`. Keeps quiet-but-connected viewers
/// ahead of the presence reaper without a database write per pong.
const PRESENCE_REFRESH_INTERVAL: Duration = Duration::from_secs(45);
/// Messages replayed to a client right after joining a chat room.
const BACKLOG_LIMIT: i64 = 50;

/// What the connecting user is allowed to do in this room, resolved
/// during the upgrade handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAuthz {
    pub is_owner: bool,
    pub is_moderator: bool,
}

impl SessionAuthz {
    pub fn privileged(&self) -> bool {
        self.is_owner || self.is_moderator
    }
}

/// A serialized frame headed for this session's socket.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct Frame(pub String);

pub struct RoomSession {
    room: Room,
    user_id: Uuid,
    authz: SessionAuthz,
    subscriber_id: SubscriberId,
    state: AppState,
    hb: Instant,
    presence_refresh: Instant,
}

impl RoomSession {
    pub fn new(
        room: Room,
        user_id: Uuid,
        authz: SessionAuthz,
        subscriber_id: SubscriberId,
        state: AppState,
    ) -> Self {
        Self {
            room,
            user_id,
            authz,
            subscriber_id,
            state,
            hb: Instant::now(),
            presence_refresh: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    user = %act.user_id,
                    room = %act.room,
                    "websocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Any socket traffic proves the client is alive; periodically fold
    /// that into the presence row so the reaper does not reclaim a viewer
    /// who simply is not chatting.
    fn touch_presence(&mut self) {
        if self.room.kind() == RoomKind::Inbox
            || self.presence_refresh.elapsed() < PRESENCE_REFRESH_INTERVAL
        {
            return;
        }
        self.presence_refresh = Instant::now();

        let state = self.state.clone();
        let room = self.room;
        let user_id = self.user_id;
        actix::spawn(async move {
            if let Err(e) = state.presence.heartbeat(&room, user_id).await {
                tracing::warn!(error = %e, user = %user_id, room = %room, "presence refresh failed");
            }
        });
    }
}

impl Actor for RoomSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user = %self.user_id, room = %self.room, "session joined");
        self.hb(ctx);

        let state = self.state.clone();
        let room = self.room;
        let user_id = self.user_id;
        let authz = self.authz;
        let addr = ctx.address();

        actix::spawn(async move {
            if room.kind() == RoomKind::Inbox {
                addr.do_send(Frame(
                    Outbound::System {
                        message: "connected".into(),
                    }
                    .to_json(),
                ));
                return;
            }

            // Presence first, then the join announcement, so a viewer
            // counting on the announcement sees the row already open.
            if let Err(e) = state.presence.join(&room, user_id).await {
                tracing::error!(error = %e, user = %user_id, room = %room, "presence join failed");
            }

            state
                .bus
                .publish(&room, &Outbound::status("joined", user_id), Scope::Global)
                .await;

            if room.kind() == RoomKind::Stream {
                broadcast_viewer_count(&state, &room).await;
            }

            // Replay a short backlog directly to this client, oldest
            // first. Moderated messages are withheld from plain viewers.
            match state.conversations.list_recent(&room, BACKLOG_LIMIT).await {
                Ok(mut backlog) => {
                    backlog.reverse();
                    for message in backlog
                        .iter()
                        .filter(|m| m.visible_to(user_id, authz.is_owner, authz.is_moderator))
                    {
                        addr.do_send(Frame(
                            Outbound::Message {
                                message: MessagePayload::from(message),
                            }
                            .to_json(),
                        ));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, room = %room, "backlog replay failed");
                }
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user = %self.user_id, room = %self.room, "session left");

        let state = self.state.clone();
        let room = self.room;
        let user_id = self.user_id;
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            state
                .registry
                .remove_subscriber(&room.key(), subscriber_id)
                .await;

            if room.kind() == RoomKind::Inbox {
                return;
            }

            match state.presence.leave(&room, user_id).await {
                Ok(Some(watch_time)) => {
                    tracing::debug!(user = %user_id, room = %room, watch_time_secs = watch_time, "presence closed");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, user = %user_id, room = %room, "presence leave failed");
                }
            }

            state
                .bus
                .publish(&room, &Outbound::status("left", user_id), Scope::Global)
                .await;

            if room.kind() == RoomKind::Stream {
                broadcast_viewer_count(&state, &room).await;
            }
        });
    }
}

impl Handler<Frame> for RoomSession {
    type Result = ();

    fn handle(&mut self, msg: Frame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RoomSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
                self.touch_presence();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.touch_presence();
                let event = Inbound::parse(&text);
                let state = self.state.clone();
                let room = self.room;
                let user_id = self.user_id;
                let authz = self.authz;
                let addr = ctx.address();

                actix::spawn(async move {
                    dispatch_event(state, room, user_id, authz, event, addr).await;
                });
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary frames are not part of the protocol");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(?reason, "close frame received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Recompute a room's viewer count, refresh the stream metrics row and
/// broadcast the absolute value. Shared by session join/leave and the
/// stale-presence reaper.
pub async fn broadcast_viewer_count(state: &AppState, room: &Room) {
    match state.presence.viewer_count(room).await {
        Ok(count) => {
            if let Room::Stream(stream_id) = room {
                if let Err(e) = state.presence.refresh_stream_viewers(*stream_id, count).await {
                    tracing::warn!(error = %e, stream = %stream_id, "viewer metric refresh failed");
                }
            }
            state
                .bus
                .publish(
                    room,
                    &Outbound::ViewerCountUpdate {
                        viewer_count: count,
                    },
                    Scope::Global,
                )
                .await;
        }
        Err(e) => {
            tracing::warn!(error = %e, room = %room, "viewer count unavailable");
        }
    }
}

fn send_error(addr: &Addr<RoomSession>, err: &AppError) {
    addr.do_send(Frame(
        Outbound::error(err.error_code(), err.to_string()).to_json(),
    ));
}

/// Route one inbound event to the engine that owns it. Events that make
/// no sense for this room kind are rejected with a structured reason;
/// unknown event types were already mapped to `Ignored` by the parser and
/// are dropped here.
async fn dispatch_event(
    state: AppState,
    room: Room,
    user_id: Uuid,
    authz: SessionAuthz,
    event: Inbound,
    addr: Addr<RoomSession>,
) {
    let kind = room.kind();
    let is_chat_room = matches!(
        kind,
        RoomKind::Stream | RoomKind::Comments | RoomKind::Conversation | RoomKind::Direct
    );

    match event {
        Inbound::Ignored => {}

        Inbound::Heartbeat => {
            if let Err(e) = state.presence.heartbeat(&room, user_id).await {
                tracing::warn!(error = %e, user = %user_id, room = %room, "heartbeat update failed");
            }
        }

        Inbound::Typing if is_chat_room => {
            state
                .bus
                .publish(&room, &Outbound::Typing { user_id }, Scope::Global)
                .await;
        }

        Inbound::Read { message_id }
            if matches!(kind, RoomKind::Conversation | RoomKind::Direct) =>
        {
            match state.conversations.mark_read(&room, message_id, user_id).await {
                Ok(true) => {
                    state
                        .bus
                        .publish(
                            &room,
                            &Outbound::ReadReceipt {
                                message_id,
                                user_id,
                            },
                            Scope::Global,
                        )
                        .await;
                }
                Ok(false) => {}
                Err(e) => send_error(&addr, &e),
            }
        }

        Inbound::Message { content, parent_id } if is_chat_room => {
            handle_message(&state, room, user_id, content, parent_id, &addr).await;
        }

        Inbound::Reaction {
            reaction_type,
            post,
            comment,
            stream,
        } if is_chat_room => {
            handle_reaction(&state, room, user_id, &reaction_type, post, comment, stream, &addr)
                .await;
        }

        Inbound::StreamControl { action, title } if kind == RoomKind::Stream => {
            handle_stream_control(&state, room, user_id, authz, action, title, &addr).await;
        }

        Inbound::Flag { message_id } if is_chat_room => {
            match state
                .moderation
                .flag_message(&room.key(), message_id, user_id)
                .await
            {
                Ok(_) => {
                    addr.do_send(Frame(
                        Outbound::System {
                            message: "message flagged for review".into(),
                        }
                        .to_json(),
                    ));
                }
                Err(e) => send_error(&addr, &e),
            }
        }

        Inbound::Ban {
            user_id: target,
            reason,
            expires_at,
        } if kind == RoomKind::Stream => {
            handle_ban(&state, room, user_id, authz, target, reason, expires_at, &addr).await;
        }

        Inbound::Unban { user_id: target } if kind == RoomKind::Stream => {
            if !authz.privileged() {
                send_error(
                    &addr,
                    &AppError::Forbidden("only the streamer or a moderator can lift bans".into()),
                );
                return;
            }
            match state.bans.lift(&room, target).await {
                Ok(()) => {
                    addr.do_send(Frame(
                        Outbound::System {
                            message: "ban lifted".into(),
                        }
                        .to_json(),
                    ));
                }
                Err(e) => send_error(&addr, &e),
            }
        }

        Inbound::MarkRead { notification_id } if kind == RoomKind::Inbox => {
            if let Err(e) = state.notifications.mark_read(notification_id, user_id).await {
                send_error(&addr, &e);
            }
        }

        // A recognized event aimed at the wrong room kind.
        _ => {
            send_error(
                &addr,
                &AppError::BadRequest("event not supported in this room".into()),
            );
        }
    }
}

async fn handle_message(
    state: &AppState,
    room: Room,
    user_id: Uuid,
    content: String,
    parent_id: Option<Uuid>,
    addr: &Addr<RoomSession>,
) {
    // Bans cut in before anything is written; the pipeline never runs on
    // a banned user's message.
    match state.bans.is_banned(&room, user_id).await {
        Ok(true) => {
            send_error(
                addr,
                &AppError::Forbidden("you are banned from this room".into()),
            );
            return;
        }
        Ok(false) => {}
        Err(e) => {
            send_error(addr, &e);
            return;
        }
    }

    // Threaded replies exist in comment rooms and DMs only.
    let parent_id = match room.kind() {
        RoomKind::Comments | RoomKind::Direct => parent_id,
        _ => None,
    };

    let mut message = match state
        .conversations
        .create_message(&room, user_id, &content, parent_id)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            send_error(addr, &e);
            return;
        }
    };

    // Screen after persist: the flags land on the stored row and the
    // broadcast below carries the final state.
    if let Err(e) = state.moderation.screen_new_message(&mut message).await {
        tracing::error!(error = %e, message_id = %message.id, "moderation screen failed");
    }

    state
        .bus
        .publish(
            &room,
            &Outbound::Message {
                message: MessagePayload::from(&message),
            },
            Scope::Global,
        )
        .await;

    notify_for_message(state, &room, &message).await;
}

/// Post-mutation notification hooks for a new message, in a fixed order:
/// direct recipient, post author, reply parent, mentions. Every path is
/// self-suppressing for the sender and none may fail the message.
async fn notify_for_message(state: &AppState, room: &Room, message: &RoomMessage) {
    let sender = message.sender_id;
    let body = preview(&message.content, 100);

    match room.kind() {
        RoomKind::Direct => {
            if let Some(recipient) = ConversationService::direct_recipient(room, sender) {
                if let Err(e) = state
                    .notifications
                    .notify(
                        recipient,
                        Some(sender),
                        NotificationKind::Message,
                        "New message",
                        &body,
                        Some(("message", message.id)),
                    )
                    .await
                {
                    tracing::warn!(error = %e, "direct message notification failed");
                }
            }
        }
        RoomKind::Comments => {
            let Room::Post(post_id) = room else { return };

            match state.conversations.post_author(*post_id).await {
                Ok(Some(author)) => {
                    if let Err(e) = state
                        .notifications
                        .notify(
                            author,
                            Some(sender),
                            NotificationKind::Comment,
                            "New comment on your post",
                            &body,
                            Some(("message", message.id)),
                        )
                        .await
                    {
                        tracing::warn!(error = %e, "comment notification failed");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "post author lookup failed"),
            }

            if let Some(parent_id) = message.parent_id {
                match state.conversations.message_sender(room, parent_id).await {
                    Ok(Some(parent_author)) => {
                        if let Err(e) = state
                            .notifications
                            .notify(
                                parent_author,
                                Some(sender),
                                NotificationKind::Reply,
                                "New reply to your comment",
                                &body,
                                Some(("message", message.id)),
                            )
                            .await
                        {
                            tracing::warn!(error = %e, "reply notification failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "reply parent lookup failed"),
                }
            }

            notify_mentions(state, message).await;
        }
        _ => {}
    }
}

async fn notify_mentions(state: &AppState, message: &RoomMessage) {
    let mentions = extract_mentions(&message.content);
    if mentions.is_empty() {
        return;
    }

    let mentioned = match state.notifications.resolve_usernames(&mentions).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "mention resolution failed");
            return;
        }
    };

    let body = preview(&message.content, 100);
    for recipient in mentioned {
        if let Err(e) = state
            .notifications
            .notify(
                recipient,
                Some(message.sender_id),
                NotificationKind::Mention,
                "You were mentioned",
                &body,
                Some(("message", message.id)),
            )
            .await
        {
            tracing::warn!(error = %e, recipient = %recipient, "mention notification failed");
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_ban(
    state: &AppState,
    room: Room,
    issued_by: Uuid,
    authz: SessionAuthz,
    target: Uuid,
    reason: Option<String>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    addr: &Addr<RoomSession>,
) {
    if !authz.privileged() {
        send_error(
            addr,
            &AppError::Forbidden("only the streamer or a moderator can ban users".into()),
        );
        return;
    }

    let Room::Stream(stream_id) = room else {
        return;
    };

    let owner = match state.streams.get(stream_id).await {
        Ok(Some(stream)) => stream.owner_id,
        Ok(None) => {
            send_error(addr, &AppError::NotFound);
            return;
        }
        Err(e) => {
            send_error(addr, &e);
            return;
        }
    };

    match state
        .bans
        .ban(&room, owner, target, issued_by, reason.as_deref(), expires_at)
        .await
    {
        Ok(_) => {
            addr.do_send(Frame(
                Outbound::System {
                    message: "user banned".into(),
                }
                .to_json(),
            ));
        }
        Err(e) => send_error(addr, &e),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_reaction(
    state: &AppState,
    room: Room,
    user_id: Uuid,
    reaction_type: &str,
    post: Option<Uuid>,
    comment: Option<Uuid>,
    stream: Option<Uuid>,
    addr: &Addr<RoomSession>,
) {
    let Some(kind) = ReactionKind::parse(reaction_type) else {
        send_error(
            addr,
            &AppError::BadRequest(format!("unknown reaction kind: {reaction_type}")),
        );
        return;
    };

    let target = match (post, comment, stream) {
        (Some(id), None, None) => ReactionTarget::Post(id),
        (None, Some(id), None) => ReactionTarget::Comment(id),
        (None, None, Some(id)) => ReactionTarget::Stream(id),
        // Stream chat clients react to "this stream" without naming it.
        (None, None, None) if matches!(room, Room::Stream(_)) => {
            let Room::Stream(id) = room else { return };
            ReactionTarget::Stream(id)
        }
        _ => {
            send_error(
                addr,
                &AppError::BadRequest(
                    "provide exactly one of post, comment or stream".into(),
                ),
            );
            return;
        }
    };

    match state.reactions.toggle(user_id, &target, kind).await {
        Ok((outcome, summary)) => {
            state
                .bus
                .publish(
                    &room,
                    &Outbound::Reaction {
                        user_id,
                        target_type: target.type_str().to_string(),
                        target_id: target.id(),
                        reaction_type: kind.as_str().to_string(),
                        action: outcome.as_str().to_string(),
                    },
                    Scope::Global,
                )
                .await;

            // Full summary, not a delta: consumers stay correct under
            // broker reordering and duplicate delivery.
            state
                .bus
                .publish(
                    &room,
                    &Outbound::ReactionSummary {
                        target_type: target.type_str().to_string(),
                        target_id: target.id(),
                        summary,
                    },
                    Scope::Global,
                )
                .await;
        }
        Err(e) => send_error(addr, &e),
    }
}

async fn handle_stream_control(
    state: &AppState,
    room: Room,
    user_id: Uuid,
    authz: SessionAuthz,
    action: StreamControlAction,
    title: Option<String>,
    addr: &Addr<RoomSession>,
) {
    if !authz.is_owner {
        send_error(
            addr,
            &AppError::Forbidden("only the streamer can control the stream".into()),
        );
        return;
    }

    let Room::Stream(stream_id) = room else {
        return;
    };

    let result = match action {
        StreamControlAction::Start => state.streams.start(stream_id, user_id).await,
        StreamControlAction::End => state.streams.end(stream_id, user_id).await,
        StreamControlAction::UpdateTitle => match title.as_deref() {
            Some(title) => state.streams.update_title(stream_id, user_id, title).await,
            None => {
                send_error(addr, &AppError::BadRequest("title is required".into()));
                return;
            }
        },
    };

    match result {
        Ok(stream) => {
            state
                .bus
                .publish(
                    &room,
                    &Outbound::StreamStatus {
                        status: stream.status.clone(),
                        title: Some(stream.title.clone()),
                    },
                    Scope::Global,
                )
                .await;
        }
        Err(e) => send_error(addr, &e),
    }
}
