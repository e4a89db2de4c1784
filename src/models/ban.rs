use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A room-scoped ban.
///
/// `expires_at = NULL` means permanent. A user with an active ban is
/// rejected from joining the room and from posting into it; the room owner
/// can never be banned from their own room.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomBan {
    pub id: Uuid,
    pub room_key: String,
    pub user_id: Uuid,
    pub issued_by: Uuid,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RoomBan {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ban(expires_at: Option<DateTime<Utc>>) -> RoomBan {
        RoomBan {
            id: Uuid::new_v4(),
            room_key: "stream:00000000-0000-0000-0000-000000000001".into(),
            user_id: Uuid::new_v4(),
            issued_by: Uuid::new_v4(),
            reason: None,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn permanent_ban_is_always_active() {
        assert!(ban(None).is_active(Utc::now()));
    }

    #[test]
    fn ban_expires_at_deadline() {
        let now = Utc::now();
        assert!(ban(Some(now + Duration::hours(1))).is_active(now));
        assert!(!ban(Some(now - Duration::seconds(1))).is_active(now));
    }
}
