//! Outbound actions and their wire encoding

use std::fmt;

use crate::{
    constants::{HEADER_ACTION, LINE_TERMINATOR},
    error::{AmiError, AmiResult},
};

/// Reject user-provided text containing line breaks.
///
/// Actions are line-delimited; an embedded newline would let a caller smuggle
/// extra headers or a whole extra action onto the wire.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::protocol_error(format!(
            "{} must not contain newlines",
            context
        )));
    }
    Ok(())
}

/// Actions the session itself sends.
#[derive(Clone, PartialEq, Eq)]
pub enum AmiAction {
    /// Authenticate with username and secret
    Login {
        /// Manager username
        username: String,
        /// Manager secret
        secret: String,
    },
    /// End the manager session
    Logoff,
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmiAction::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("secret", &"[REDACTED]")
                .finish(),
            AmiAction::Logoff => write!(f, "Logoff"),
        }
    }
}

impl AmiAction {
    /// Validate user-supplied fields, then convert to wire format.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        match self {
            AmiAction::Login { username, secret } => {
                validate_no_newlines(username, "username")?;
                validate_no_newlines(secret, "secret")?;
                Ok(format!(
                    "Action: Login\nUsername: {}\nSecret: {}\n\n",
                    username, secret
                ))
            }
            AmiAction::Logoff => Ok("Action: Logoff\n\n".to_string()),
        }
    }

    /// Action name as sent in the `Action` header.
    pub fn name(&self) -> &'static str {
        match self {
            AmiAction::Login { .. } => "Login",
            AmiAction::Logoff => "Logoff",
        }
    }
}

/// Builder for actions not covered by [`AmiAction`].
///
/// Headers keep their insertion order. The result is sent fire-and-forget;
/// replies arrive as ordinary event notifications.
///
/// ```
/// use asterisk_ami_tokio::ActionBuilder;
///
/// # fn main() -> Result<(), asterisk_ami_tokio::AmiError> {
/// let wire = ActionBuilder::new("Originate")
///     .header("Channel", "SIP/100")?
///     .header("Exten", "200")?
///     .build()?;
/// assert_eq!(wire, "Action: Originate\nChannel: SIP/100\nExten: 200\n\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    action: String,
    headers: Vec<(String, String)>,
}

impl ActionBuilder {
    /// Start an action with the given `Action:` name.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header.
    ///
    /// Returns an error if the name is empty, contains a colon, or if either
    /// part contains newline characters.
    pub fn header(mut self, name: &str, value: &str) -> AmiResult<Self> {
        validate_no_newlines(name, "header name")?;
        validate_no_newlines(value, "header value")?;
        if name
            .trim()
            .is_empty()
            || name.contains(':')
        {
            return Err(AmiError::protocol_error(format!(
                "invalid header name '{}'",
                name
            )));
        }
        self.headers
            .push((name.to_string(), value.to_string()));
        Ok(self)
    }

    /// Produce the wire string: `Action` line, headers, blank line.
    ///
    /// Fails if the action name is empty or contains newline characters.
    pub fn build(self) -> AmiResult<String> {
        validate_no_newlines(&self.action, "action name")?;
        if self
            .action
            .trim()
            .is_empty()
        {
            return Err(AmiError::protocol_error("empty action name"));
        }
        use std::fmt::Write;
        let mut result = String::new();
        let _ = write!(result, "{}: {}{}", HEADER_ACTION, self.action, LINE_TERMINATOR);
        for (key, value) in &self.headers {
            let _ = write!(result, "{}: {}{}", key, value, LINE_TERMINATOR);
        }
        result.push_str(LINE_TERMINATOR);
        Ok(result)
    }
}
