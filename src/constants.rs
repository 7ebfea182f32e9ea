//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket read chunk size (64KB)
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Initial receive buffer allocation. Most AMI packets are well under 1KB.
pub const BUF_CHUNK: usize = 4 * 1024;

/// Terminator of packets received from the server
pub const PACKET_TERMINATOR: &str = "\r\n\r\n";

/// Line separator used in client-sent actions
pub const LINE_TERMINATOR: &str = "\n";

/// Header naming the action in client-sent packets
pub const HEADER_ACTION: &str = "Action";

/// `Response` values and `Message` texts recognized by the session.
pub const RESPONSE_SUCCESS: &str = "Success";
/// Server rejected the request.
pub const RESPONSE_ERROR: &str = "Error";
/// Server acknowledged a logoff and is about to close the socket.
pub const RESPONSE_GOODBYE: &str = "Goodbye";
/// `Message` sent with a successful login.
pub const MESSAGE_AUTH_ACCEPTED: &str = "Authentication accepted";
/// `Message` sent with a rejected login.
pub const MESSAGE_AUTH_FAILED: &str = "Authentication failed";

/// Connection timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
