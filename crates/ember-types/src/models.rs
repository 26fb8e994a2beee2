use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Human-chosen room name. Case-sensitive; never empty when built from user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Parse a room name typed by a user. Surrounding whitespace is trimmed;
    /// returns `None` if nothing is left.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for RoomName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RoomName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Requested room lifetime in seconds, accepted only inside `Ttl::MIN..=Ttl::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ttl(u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TtlError {
    #[error("TTL must be a whole number of seconds, got {0:?}")]
    NotANumber(String),

    #[error("TTL must be between {min} and {max} seconds, got {0}", min = Ttl::MIN, max = Ttl::MAX)]
    OutOfRange(i64),
}

impl Ttl {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 3599;

    pub fn new(seconds: u32) -> Result<Self, TtlError> {
        if (Self::MIN..=Self::MAX).contains(&seconds) {
            Ok(Self(seconds))
        } else {
            Err(TtlError::OutOfRange(seconds.into()))
        }
    }

    /// Parse TTL text as typed into the create form.
    pub fn parse(input: &str) -> Result<Self, TtlError> {
        let trimmed = input.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| TtlError::NotANumber(trimmed.to_string()))?;
        let seconds = u32::try_from(value).map_err(|_| TtlError::OutOfRange(value))?;
        Self::new(seconds)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Payload of `create-room` (outbound) and `new-room-created` (inbound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnnouncement {
    pub room_name: RoomName,
    pub ttl: u64,
    /// Ciphertext of the validation phrase under the room password.
    pub validation: String,
}

/// One entry of the `initial-room-list` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub ttl: u64,
    pub validation: String,
}

/// The `initial-room-list` snapshot, in the order the server sent it.
///
/// On the wire this is a JSON object keyed by room name. A repeated name
/// replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomList(Vec<(RoomName, RoomSnapshot)>);

impl RoomList {
    pub fn get(&self, name: &RoomName) -> Option<&RoomSnapshot> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &RoomName) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomName, &RoomSnapshot)> {
        self.0.iter().map(|(n, s)| (n, s))
    }

    pub fn names(&self) -> impl Iterator<Item = &RoomName> {
        self.0.iter().map(|(n, _)| n)
    }

    fn insert(&mut self, name: RoomName, snapshot: RoomSnapshot) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = snapshot,
            None => self.0.push((name, snapshot)),
        }
    }
}

impl FromIterator<(RoomName, RoomSnapshot)> for RoomList {
    fn from_iter<I: IntoIterator<Item = (RoomName, RoomSnapshot)>>(iter: I) -> Self {
        let mut list = RoomList::default();
        for (name, snapshot) in iter {
            list.insert(name, snapshot);
        }
        list
    }
}

impl IntoIterator for RoomList {
    type Item = (RoomName, RoomSnapshot);
    type IntoIter = std::vec::IntoIter<(RoomName, RoomSnapshot)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for RoomList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, snapshot) in &self.0 {
            map.serialize_entry(name, snapshot)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoomList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoomListVisitor;

        impl<'de> Visitor<'de> for RoomListVisitor {
            type Value = RoomList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of room snapshots keyed by room name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RoomList, A::Error> {
                let mut list = RoomList::default();
                while let Some((name, snapshot)) = access.next_entry::<RoomName, RoomSnapshot>()? {
                    list.insert(name, snapshot);
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(RoomListVisitor)
    }
}

/// Payload of `send-chat-message`. `message` is always ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub room: RoomName,
    pub name: String,
    pub message: String,
}

/// A chat message as relayed by the server.
///
/// The server only ever sees and stores ciphertext in `message`.
/// `time` is a display string assigned by the server and `id` is the
/// sender's connection id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room: RoomName,
    pub name: String,
    pub message: String,
    pub time: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_bounds() {
        assert!(Ttl::parse("3599").is_ok());
        assert!(Ttl::parse(" 120 ").is_ok());
        assert!(Ttl::parse("1").is_ok());

        assert_eq!(Ttl::parse("0"), Err(TtlError::OutOfRange(0)));
        assert_eq!(Ttl::parse("3600"), Err(TtlError::OutOfRange(3600)));
        assert_eq!(Ttl::parse("-5"), Err(TtlError::OutOfRange(-5)));
        assert!(matches!(Ttl::parse("abc"), Err(TtlError::NotANumber(_))));
        assert!(matches!(Ttl::parse(""), Err(TtlError::NotANumber(_))));
        assert!(matches!(Ttl::parse("12abc"), Err(TtlError::NotANumber(_))));
    }

    #[test]
    fn room_name_is_trimmed_and_case_sensitive() {
        assert_eq!(RoomName::parse("  alpha "), Some(RoomName::from("alpha")));
        assert_eq!(RoomName::parse("   "), None);
        assert_ne!(RoomName::from("Alpha"), RoomName::from("alpha"));
    }

    #[test]
    fn room_list_keeps_server_order() {
        let json = r#"{"zulu":{"ttl":10,"validation":"z"},"alpha":{"ttl":20,"validation":"a"},"mike":{"ttl":30,"validation":"m"}}"#;
        let rooms: RoomList = serde_json::from_str(json).unwrap();
        let names: Vec<_> = rooms.names().map(RoomName::as_str).collect();
        assert_eq!(names, ["zulu", "alpha", "mike"]);
        assert_eq!(rooms.get(&"alpha".into()).unwrap().ttl, 20);
        assert_eq!(serde_json::to_string(&rooms).unwrap(), json);

        // Through a `Value`, as the event decoder does
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let rooms: RoomList = serde_json::from_value(value).unwrap();
        let names: Vec<_> = rooms.names().map(RoomName::as_str).collect();
        assert_eq!(names, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn repeated_room_replaces_in_place() {
        let snapshot = |ttl| RoomSnapshot { ttl, validation: "t".into() };
        let rooms: RoomList = [
            ("beta".into(), snapshot(1)),
            ("alpha".into(), snapshot(2)),
            ("beta".into(), snapshot(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(rooms.len(), 2);
        let entries: Vec<_> = rooms.iter().map(|(n, s)| (n.as_str(), s.ttl)).collect();
        assert_eq!(entries, [("beta", 3), ("alpha", 2)]);
    }

    #[test]
    fn announcement_uses_camel_case_fields() {
        let announcement = RoomAnnouncement {
            room_name: "alpha".into(),
            ttl: 120,
            validation: "token".into(),
        };
        let json = serde_json::to_value(&announcement).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "roomName": "alpha", "ttl": 120, "validation": "token" })
        );
    }
}
