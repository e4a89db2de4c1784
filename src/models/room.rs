use uuid::Uuid;

/// Logical broadcast scope for realtime events.
///
/// Rooms are ephemeral: they exist only as keys on the fan-out bus and in
/// the presence tracker, never as rows of their own. Every room derives a
/// stable textual key from the entity it wraps, and both sides of a direct
/// conversation derive the same key regardless of who connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Live stream viewers and chat.
    Stream(Uuid),
    /// Live comments under a post.
    Post(Uuid),
    /// Group conversation.
    Conversation(Uuid),
    /// Direct messages between two users, normalized so that the lower
    /// UUID always comes first.
    Direct(Uuid, Uuid),
    /// A user's personal notification channel.
    User(Uuid),
}

/// Behavioral classification of a room, used by the session protocol to
/// decide which inbound events are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Stream,
    Comments,
    Conversation,
    Direct,
    Inbox,
}

impl Room {
    /// Direct-message room between two users; argument order is irrelevant.
    pub fn direct(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Room::Direct(a, b)
        } else {
            Room::Direct(b, a)
        }
    }

    pub fn kind(&self) -> RoomKind {
        match self {
            Room::Stream(_) => RoomKind::Stream,
            Room::Post(_) => RoomKind::Comments,
            Room::Conversation(_) => RoomKind::Conversation,
            Room::Direct(_, _) => RoomKind::Direct,
            Room::User(_) => RoomKind::Inbox,
        }
    }

    /// Stable key used on the fan-out bus, in the presence tracker and in
    /// every room-scoped table.
    pub fn key(&self) -> String {
        match self {
            Room::Stream(id) => format!("stream:{id}"),
            Room::Post(id) => format!("post:{id}"),
            Room::Conversation(id) => format!("conversation:{id}"),
            Room::Direct(low, high) => format!("dm:{low}:{high}"),
            Room::User(id) => format!("user:{id}"),
        }
    }

    /// Parse a room key back into a room. Returns `None` for malformed keys;
    /// the bus never fails on foreign topics, it just skips them.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(2, ':');
        let prefix = parts.next()?;
        let rest = parts.next()?;
        match prefix {
            "stream" => Uuid::parse_str(rest).ok().map(Room::Stream),
            "post" => Uuid::parse_str(rest).ok().map(Room::Post),
            "conversation" => Uuid::parse_str(rest).ok().map(Room::Conversation),
            "user" => Uuid::parse_str(rest).ok().map(Room::User),
            "dm" => {
                let mut ids = rest.splitn(2, ':');
                let low = Uuid::parse_str(ids.next()?).ok()?;
                let high = Uuid::parse_str(ids.next()?).ok()?;
                Some(Room::direct(low, high))
            }
            _ => None,
        }
    }

    /// For a direct room, the participant other than `me` (if `me` is one
    /// of the pair).
    pub fn direct_peer(&self, me: Uuid) -> Option<Uuid> {
        match self {
            Room::Direct(low, high) if *low == me => Some(*high),
            Room::Direct(low, high) if *high == me => Some(*low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_room_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(Room::direct(a, b).key(), Room::direct(b, a).key());
    }

    #[test]
    fn keys_round_trip_through_parse() {
        let rooms = [
            Room::Stream(Uuid::new_v4()),
            Room::Post(Uuid::new_v4()),
            Room::Conversation(Uuid::new_v4()),
            Room::direct(Uuid::new_v4(), Uuid::new_v4()),
            Room::User(Uuid::new_v4()),
        ];
        for room in rooms {
            assert_eq!(Room::parse(&room.key()), Some(room));
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Room::parse("stream:not-a-uuid"), None);
        assert_eq!(Room::parse("unknown:kind"), None);
        assert_eq!(Room::parse("dm:only-one-part"), None);
        assert_eq!(Room::parse(""), None);
    }

    #[test]
    fn direct_peer_resolves_the_other_side() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room = Room::direct(a, b);
        assert_eq!(room.direct_peer(a), Some(b));
        assert_eq!(room.direct_peer(b), Some(a));
        assert_eq!(room.direct_peer(Uuid::new_v4()), None);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Room::Stream(Uuid::new_v4()).kind(), RoomKind::Stream);
        assert_eq!(Room::User(Uuid::new_v4()).kind(), RoomKind::Inbox);
    }
}
