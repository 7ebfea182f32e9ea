//! AMI packets and the key/value decoder

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::headers::PacketHeader;

/// One decoded AMI packet: header keys to values, in wire order.
///
/// Keys are case-sensitive and never empty. When a key repeats within a
/// packet only its first value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet {
    headers: IndexMap<String, String>,
}

impl Packet {
    /// Decode raw packet text. See [`decode`].
    pub fn decode(raw: &str) -> Self {
        decode(raw)
    }

    /// Look up a header value by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .map(|s| s.as_str())
    }

    /// Whether the packet has a header with this name.
    pub fn contains_key(&self, name: impl AsRef<str>) -> bool {
        self.headers
            .contains_key(name.as_ref())
    }

    /// `Response` header, present on replies to actions.
    pub fn response(&self) -> Option<&str> {
        self.get(PacketHeader::Response)
    }

    /// `Message` header.
    pub fn message(&self) -> Option<&str> {
        self.get(PacketHeader::Message)
    }

    /// `Event` header, present on unsolicited events.
    pub fn event(&self) -> Option<&str> {
        self.get(PacketHeader::Event)
    }

    /// `ActionID` header, echoed back on replies to actions that carried one.
    pub fn action_id(&self) -> Option<&str> {
        self.get(PacketHeader::ActionId)
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.headers
            .len()
    }

    /// `true` when no header survived decoding.
    pub fn is_empty(&self) -> bool {
        self.headers
            .is_empty()
    }

    /// Iterate headers in the order they were received.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the underlying ordered map.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Take the underlying ordered map.
    pub fn into_headers(self) -> IndexMap<String, String> {
        self.headers
    }

    /// Insert unless the key is already present. Returns `false` for a
    /// duplicate.
    fn insert_first(&mut self, key: String, value: String) -> bool {
        match self
            .headers
            .entry(key)
        {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Packet {
    /// Builds a packet with the same first-wins rule as [`decode`]. Empty keys
    /// are skipped.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut packet = Packet::default();
        for (key, value) in iter {
            let key = key.into();
            if !key.is_empty() {
                packet.insert_first(key, value.into());
            }
        }
        packet
    }
}

impl<'a> IntoIterator for &'a Packet {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers
            .iter()
    }
}

/// Decode one raw packet into a [`Packet`].
///
/// Each line is trimmed; blank lines are skipped. The text before the first
/// `:` is the key and the text after it the value, both trimmed. Lines with
/// no colon or with an empty key are ignored. Never fails.
pub fn decode(raw: &str) -> Packet {
    let mut packet = Packet::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(colon_pos) = line.find(':') else {
            continue;
        };
        let key = line[..colon_pos].trim();
        if key.is_empty() {
            continue;
        }
        let value = line[colon_pos + 1..].trim();

        packet.insert_first(key.to_string(), value.to_string());
    }

    packet
}
