use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live stream row: the slice of it the realtime core needs: ownership,
/// privacy for authorization, lifecycle status, and viewer metrics.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stream {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub privacy: String,
    pub status: String,
    pub viewer_count: i32,
    pub peak_viewers: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPrivacy {
    Public,
    Friends,
    Private,
}

impl StreamPrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamPrivacy::Public => "public",
            StreamPrivacy::Friends => "friends",
            StreamPrivacy::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "friends" => StreamPrivacy::Friends,
            "private" => StreamPrivacy::Private,
            _ => StreamPrivacy::Public,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Scheduled,
    Live,
    Ended,
    Cancelled,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Scheduled => "scheduled",
            StreamStatus::Live => "live",
            StreamStatus::Ended => "ended",
            StreamStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "live" => StreamStatus::Live,
            "ended" => StreamStatus::Ended,
            "cancelled" => StreamStatus::Cancelled,
            _ => StreamStatus::Scheduled,
        }
    }
}

impl Stream {
    pub fn is_live(&self) -> bool {
        StreamStatus::parse(&self.status) == StreamStatus::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_defaults_to_public() {
        assert_eq!(StreamPrivacy::parse("public"), StreamPrivacy::Public);
        assert_eq!(StreamPrivacy::parse("anything"), StreamPrivacy::Public);
        assert_eq!(StreamPrivacy::parse("private"), StreamPrivacy::Private);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            StreamStatus::Scheduled,
            StreamStatus::Live,
            StreamStatus::Ended,
            StreamStatus::Cancelled,
        ] {
            assert_eq!(StreamStatus::parse(status.as_str()), status);
        }
    }
}
