//! Typed names for common AMI packet headers.

/// Error returned when parsing an unrecognized header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePacketHeaderError(pub String);

impl std::fmt::Display for ParsePacketHeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown packet header: {}", self.0)
    }
}

impl std::error::Error for ParsePacketHeaderError {}

define_header_enum! {
    error_type: ParsePacketHeaderError,
    /// Header names the session itself reads.
    ///
    /// Usable anywhere a header key is accepted, e.g.
    /// [`Packet::get`](crate::Packet::get). Every other field is available by
    /// its raw string name.
    pub enum PacketHeader {
        Response => "Response",
        Message => "Message",
        Event => "Event",
        ActionId => "ActionID",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(PacketHeader::ActionId.to_string(), "ActionID");
        assert_eq!(PacketHeader::Message.as_str(), "Message");
        assert_eq!(PacketHeader::Event.as_ref(), "Event");
    }

    #[test]
    fn parse_ignores_case() {
        assert_eq!("actionid".parse::<PacketHeader>(), Ok(PacketHeader::ActionId));
        assert_eq!("RESPONSE".parse::<PacketHeader>(), Ok(PacketHeader::Response));
    }

    #[test]
    fn parse_unknown() {
        let err = "X-Vendor-Field"
            .parse::<PacketHeader>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown packet header: X-Vendor-Field");
    }

    #[test]
    fn every_variant_parses_back() {
        for v in PacketHeader::ALL {
            let parsed: PacketHeader = v
                .as_str()
                .parse()
                .unwrap();
            assert_eq!(parsed, *v, "round-trip failed for {v}");
        }
    }
}
