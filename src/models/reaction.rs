use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The reaction vocabulary of the platform.
///
/// The summary cache zero-fills over this set so clients always receive a
/// complete map, including kinds nobody has used yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
    Fire,
    Heart,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 8] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Haha,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
        ReactionKind::Fire,
        ReactionKind::Heart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Haha => "haha",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
            ReactionKind::Fire => "fire",
            ReactionKind::Heart => "heart",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "love" => Some(ReactionKind::Love),
            "haha" => Some(ReactionKind::Haha),
            "wow" => Some(ReactionKind::Wow),
            "sad" => Some(ReactionKind::Sad),
            "angry" => Some(ReactionKind::Angry),
            "fire" => Some(ReactionKind::Fire),
            "heart" => Some(ReactionKind::Heart),
            _ => None,
        }
    }
}

/// Entity a reaction attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionTarget {
    Post(Uuid),
    Comment(Uuid),
    Stream(Uuid),
}

impl ReactionTarget {
    pub fn type_str(&self) -> &'static str {
        match self {
            ReactionTarget::Post(_) => "post",
            ReactionTarget::Comment(_) => "comment",
            ReactionTarget::Stream(_) => "stream",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ReactionTarget::Post(id) | ReactionTarget::Comment(id) | ReactionTarget::Stream(id) => {
                *id
            }
        }
    }
}

/// One user's reaction to one target.
///
/// Invariant: at most one row per (user, target); reacting again with a
/// different kind overwrites the kind in place, reacting with the same
/// kind deletes the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub reaction_kind: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a toggle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Created,
    Updated,
    Removed,
}

impl ToggleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleOutcome::Created => "created",
            ToggleOutcome::Updated => "updated",
            ToggleOutcome::Removed => "removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in ReactionKind::ALL {
            assert_eq!(ReactionKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(ReactionKind::parse("thumbsdown"), None);
        assert_eq!(ReactionKind::parse(""), None);
    }

    #[test]
    fn target_exposes_type_and_id() {
        let id = Uuid::new_v4();
        let target = ReactionTarget::Comment(id);
        assert_eq!(target.type_str(), "comment");
        assert_eq!(target.id(), id);
    }
}
