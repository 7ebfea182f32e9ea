//! Login/session state machine and packet classification

use std::fmt;

use crate::{
    constants::{
        MESSAGE_AUTH_ACCEPTED, MESSAGE_AUTH_FAILED, RESPONSE_ERROR, RESPONSE_GOODBYE,
        RESPONSE_SUCCESS,
    },
    packet::Packet,
};

/// Lifecycle of one manager session.
///
/// ```text
/// Disconnected --connect--> Connected --login--> AuthPending --accepted--> Authenticated
///                               ^                    |                         |
///                               +------failed--------+                         |
///                               +------------------logoff sent-----------------+
/// any state --Goodbye / transport closed--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum SessionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport open, not logged in.
    Connected,
    /// Login sent, waiting for the server's verdict.
    AuthPending,
    /// Server accepted the login.
    Authenticated,
}

impl SessionState {
    /// `true` only in [`SessionState::Authenticated`].
    pub fn is_logged_in(self) -> bool {
        self == SessionState::Authenticated
    }

    /// `true` while the transport is open.
    pub fn is_open(self) -> bool {
        self != SessionState::Disconnected
    }

    /// Transport opened. Returns whether the state changed.
    pub(crate) fn on_connected(&mut self) -> bool {
        self.set_if(*self == SessionState::Disconnected, SessionState::Connected)
    }

    /// Login action written. A session that is already authenticated stays
    /// so until the server says otherwise.
    pub(crate) fn on_login_sent(&mut self) -> bool {
        self.set_if(
            matches!(self, SessionState::Connected | SessionState::AuthPending),
            SessionState::AuthPending,
        )
    }

    /// Logoff action written; logged out without waiting for the server.
    pub(crate) fn on_logoff_sent(&mut self) -> bool {
        self.set_if(
            *self == SessionState::Authenticated,
            SessionState::Connected,
        )
    }

    /// Transport gone, for whatever reason.
    pub(crate) fn on_closed(&mut self) -> bool {
        self.set_if(self.is_open(), SessionState::Disconnected)
    }

    /// Apply a classified inbound packet and report which lifecycle
    /// notification, if any, it produces.
    ///
    /// The notification is produced even when the state does not change, e.g.
    /// a second `Authentication failed` while already logged out.
    pub(crate) fn apply(&mut self, kind: PacketKind) -> Option<Lifecycle> {
        match kind {
            PacketKind::Goodbye => {
                *self = SessionState::Disconnected;
                Some(Lifecycle::Logoff)
            }
            PacketKind::LoginFailed => {
                if self.is_open() {
                    *self = SessionState::Connected;
                }
                Some(Lifecycle::LoginFailed)
            }
            PacketKind::LoginAccepted => {
                if self.is_open() {
                    *self = SessionState::Authenticated;
                }
                Some(Lifecycle::LoginSuccess)
            }
            PacketKind::Other => None,
        }
    }

    fn set_if(&mut self, cond: bool, next: SessionState) -> bool {
        if cond && *self != next {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::AuthPending => "auth-pending",
            SessionState::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// What an inbound packet means to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// `Response: Goodbye`
    Goodbye,
    /// `Response: Error` with `Message: Authentication failed`
    LoginFailed,
    /// `Response: Success` with `Message: Authentication accepted`
    LoginAccepted,
    /// Anything else; only delivered as a generic event.
    Other,
}

/// Session lifecycle notifications derived from packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Login accepted.
    LoginSuccess,
    /// Login rejected.
    LoginFailed,
    /// Session ended.
    Logoff,
}

/// Classify a decoded packet. Matching is exact and case-sensitive.
pub fn classify(packet: &Packet) -> PacketKind {
    match (packet.response(), packet.message()) {
        (Some(RESPONSE_GOODBYE), _) => PacketKind::Goodbye,
        (Some(RESPONSE_ERROR), Some(MESSAGE_AUTH_FAILED)) => PacketKind::LoginFailed,
        (Some(RESPONSE_SUCCESS), Some(MESSAGE_AUTH_ACCEPTED)) => PacketKind::LoginAccepted,
        _ => PacketKind::Other,
    }
}

/// Where and as whom to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Host name or address of the manager interface.
    pub host: String,
    /// TCP port, usually [`DEFAULT_AMI_PORT`](crate::DEFAULT_AMI_PORT).
    pub port: u16,
    /// Manager username.
    pub username: String,
    /// Manager secret.
    pub secret: String,
}

impl SessionConfig {
    /// Bundle connection target and credentials.
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::decode;

    #[test]
    fn classify_recognized_responses() {
        assert_eq!(
            classify(&decode("Response: Goodbye\nMessage: Thanks for all the fish.")),
            PacketKind::Goodbye
        );
        assert_eq!(classify(&decode("Response: Goodbye")), PacketKind::Goodbye);
        assert_eq!(
            classify(&decode("Response: Error\nMessage: Authentication failed")),
            PacketKind::LoginFailed
        );
        assert_eq!(
            classify(&decode("Response: Success\nMessage: Authentication accepted")),
            PacketKind::LoginAccepted
        );
    }

    #[test]
    fn classify_other_packets() {
        for raw in [
            "Response: Success\nMessage: Pong",
            "Response: Error\nMessage: Permission denied",
            "Response: Success",
            "Response: success\nMessage: Authentication accepted",
            "Event: FullyBooted",
            "Message: Authentication accepted",
            "",
        ] {
            assert_eq!(classify(&decode(raw)), PacketKind::Other, "{raw:?}");
        }
    }

    #[test]
    fn happy_path_transitions() {
        let mut state = SessionState::default();
        assert_eq!(state, SessionState::Disconnected);
        assert!(!state.on_login_sent());

        assert!(state.on_connected());
        assert!(!state.on_connected());
        assert!(state.on_login_sent());
        assert_eq!(state, SessionState::AuthPending);

        assert_eq!(
            state.apply(PacketKind::LoginAccepted),
            Some(Lifecycle::LoginSuccess)
        );
        assert!(state.is_logged_in());

        assert!(state.on_logoff_sent());
        assert_eq!(state, SessionState::Connected);
        assert!(!state.is_logged_in());
        assert!(!state.on_logoff_sent());

        assert_eq!(state.apply(PacketKind::Goodbye), Some(Lifecycle::Logoff));
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn failed_login_allows_retry() {
        let mut state = SessionState::Connected;
        state.on_login_sent();
        assert_eq!(
            state.apply(PacketKind::LoginFailed),
            Some(Lifecycle::LoginFailed)
        );
        assert_eq!(state, SessionState::Connected);
        assert_eq!(
            state.apply(PacketKind::LoginFailed),
            Some(Lifecycle::LoginFailed)
        );
        assert_eq!(state, SessionState::Connected);
        assert!(state.on_login_sent());
    }

    #[test]
    fn relogin_while_authenticated_keeps_session() {
        let mut state = SessionState::Authenticated;
        assert!(!state.on_login_sent());
        assert!(state.is_logged_in());
    }

    #[test]
    fn goodbye_from_any_state() {
        for start in [
            SessionState::Connected,
            SessionState::AuthPending,
            SessionState::Authenticated,
        ] {
            let mut state = start;
            state.apply(PacketKind::Goodbye);
            assert_eq!(state, SessionState::Disconnected);
        }
    }

    #[test]
    fn other_packets_leave_state_alone() {
        let mut state = SessionState::AuthPending;
        assert_eq!(state.apply(PacketKind::Other), None);
        assert_eq!(state, SessionState::AuthPending);
    }

    #[test]
    fn close_is_idempotent() {
        let mut state = SessionState::Authenticated;
        assert!(state.on_closed());
        assert!(!state.on_closed());
        assert!(!state.is_open());
    }

    #[test]
    fn config_debug_redacts_secret() {
        let config = SessionConfig::new("admin", "hunter2", "pbx.local", 5038);
        let shown = format!("{config:?}");
        assert!(shown.contains("pbx.local"));
        assert!(!shown.contains("hunter2"));
    }
}
