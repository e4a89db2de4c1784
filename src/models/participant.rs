use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's presence record within a room.
///
/// Invariant: at most one open (`left_at IS NULL`) row per (room, user).
/// Re-joining after a leave reopens the existing row instead of inserting
/// a duplicate; `watch_time_secs` accumulates across visits.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub room_key: String,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub watch_time_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    Viewer,
    Moderator,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Viewer => "viewer",
            ParticipantRole::Moderator => "moderator",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "moderator" => ParticipantRole::Moderator,
            _ => ParticipantRole::Viewer,
        }
    }
}

impl Participant {
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }

    /// A participant counts as online when the row is open and the last
    /// heartbeat falls within the liveness window. This covers abrupt
    /// disconnects where no explicit leave was ever received.
    pub fn is_online(&self, now: DateTime<Utc>, ttl_secs: i64) -> bool {
        self.is_open() && (now - self.last_activity).num_seconds() <= ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn participant(left_at: Option<DateTime<Utc>>, last_activity: DateTime<Utc>) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            room_key: "stream:00000000-0000-0000-0000-000000000001".into(),
            user_id: Uuid::new_v4(),
            role: "viewer".into(),
            joined_at: Utc::now(),
            left_at,
            last_activity,
            watch_time_secs: 0,
        }
    }

    #[test]
    fn open_row_with_recent_heartbeat_is_online() {
        let now = Utc::now();
        let p = participant(None, now - Duration::seconds(30));
        assert!(p.is_online(now, 120));
    }

    #[test]
    fn stale_heartbeat_means_offline_even_when_open() {
        let now = Utc::now();
        let p = participant(None, now - Duration::seconds(300));
        assert!(p.is_open());
        assert!(!p.is_online(now, 120));
    }

    #[test]
    fn closed_row_is_never_online() {
        let now = Utc::now();
        let p = participant(Some(now), now);
        assert!(!p.is_online(now, 120));
    }

    #[test]
    fn unknown_role_defaults_to_viewer() {
        assert_eq!(ParticipantRole::parse("admin"), ParticipantRole::Viewer);
        assert_eq!(ParticipantRole::parse("moderator"), ParticipantRole::Moderator);
    }
}
