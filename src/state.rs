use crate::{
    config::Config,
    redis_client::RedisClient,
    services::{
        BanService, ConversationService, MailClient, ModerationService, NotificationService,
        PresenceService, ReactionService, StreamService, SummaryCache,
    },
    websocket::{fanout::FanoutBus, RoomRegistry},
};
use sqlx::PgPool;
use std::sync::Arc;

/// Process-wide dependency graph, constructed once at startup and cloned
/// into every session. Nothing in the realtime core reaches for ambient
/// globals; everything arrives through this struct.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: RedisClient,
    pub config: Arc<Config>,
    pub registry: RoomRegistry,
    pub bus: FanoutBus,
    pub presence: PresenceService,
    pub reactions: ReactionService,
    pub moderation: ModerationService,
    pub bans: BanService,
    pub streams: StreamService,
    pub conversations: ConversationService,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn build(config: Config, db: PgPool, redis: RedisClient) -> Self {
        let config = Arc::new(config);
        let registry = RoomRegistry::new();
        let bus = FanoutBus::new(registry.clone(), redis.clone());

        let mail = config.mail.as_ref().map(|mail_cfg| Arc::new(MailClient::new(mail_cfg)));
        let notifications = Arc::new(NotificationService::new(db.clone(), bus.clone(), mail));

        let cache = SummaryCache::new(redis.clone(), db.clone(), config.summary_cache_ttl_secs);
        let reactions = ReactionService::new(db.clone(), cache, notifications.clone());

        Self {
            presence: PresenceService::new(db.clone()),
            moderation: ModerationService::new(db.clone()),
            bans: BanService::new(db.clone()),
            streams: StreamService::new(db.clone()),
            conversations: ConversationService::new(db.clone(), config.max_reply_depth),
            reactions,
            notifications,
            registry,
            bus,
            db,
            redis,
            config,
        }
    }
}
