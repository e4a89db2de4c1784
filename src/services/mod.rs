pub mod bans;
pub mod conversations;
pub mod mail;
pub mod mentions;
pub mod moderation;
pub mod notifications;
pub mod presence;
pub mod reactions;
pub mod streams;
pub mod summary_cache;

pub use bans::BanService;
pub use conversations::ConversationService;
pub use mail::MailClient;
pub use mentions::extract_mentions;
pub use moderation::ModerationService;
pub use notifications::NotificationService;
pub use presence::PresenceService;
pub use reactions::ReactionService;
pub use streams::StreamService;
pub use summary_cache::SummaryCache;
