//! Concrete event kinds.
//!
//! One closed enum replaces a per-command type hierarchy. Behaviour that
//! depends on what an event *carries* (text, channels, targets) is answered
//! structurally by [`EventKind`] rather than by the type of the event.

use std::fmt;

use crate::casemap::is_channel_name;

/// CAP sub-commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapSubCommand {
    /// List capabilities the server supports.
    Ls,
    /// List capabilities currently enabled.
    List,
    /// Request capabilities.
    Req,
    /// Server accepted a request.
    Ack,
    /// Server rejected a request.
    Nak,
    /// Server now offers more capabilities (cap-notify).
    New,
    /// Server withdrew capabilities (cap-notify).
    Del,
    /// End negotiation.
    End,
}

impl CapSubCommand {
    /// Wire keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ls => "LS",
            Self::List => "LIST",
            Self::Req => "REQ",
            Self::Ack => "ACK",
            Self::Nak => "NAK",
            Self::New => "NEW",
            Self::Del => "DEL",
            Self::End => "END",
        }
    }

    /// Parse a wire keyword, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LS" => Some(Self::Ls),
            "LIST" => Some(Self::List),
            "REQ" => Some(Self::Req),
            "ACK" => Some(Self::Ack),
            "NAK" => Some(Self::Nak),
            "NEW" => Some(Self::New),
            "DEL" => Some(Self::Del),
            "END" => Some(Self::End),
            _ => None,
        }
    }
}

impl fmt::Display for CapSubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One capability token, e.g. `sasl=PLAIN,EXTERNAL` or `-multi-prefix`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CapEntry {
    /// Capability name without modifiers.
    pub name: String,
    /// Value advertised in CAP LS 302 (`name=value`).
    pub value: Option<String>,
    /// Leading `-`: the capability is being disabled.
    pub disabled: bool,
}

impl CapEntry {
    /// A plain capability name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            disabled: false,
        }
    }

    /// Parse one token. Legacy `~` and `=` modifiers are dropped.
    pub fn parse(token: &str) -> Self {
        let (disabled, rest) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let rest = rest.trim_start_matches(['~', '=']);
        let (name, value) = match rest.split_once('=') {
            Some((name, value)) => (name, Some(value.to_owned())),
            None => (rest, None),
        };
        Self {
            name: name.to_owned(),
            value,
            disabled,
        }
    }

    /// Parse a space separated list, skipping empty tokens.
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split_whitespace().map(Self::parse).collect()
    }

    /// The token as it is compared and echoed (`-name` when disabled).
    pub fn token(&self) -> String {
        if self.disabled {
            format!("-{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for CapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disabled {
            f.write_str("-")?;
        }
        f.write_str(&self.name)?;
        if let Some(value) = &self.value {
            write!(f, "={value}")?;
        }
        Ok(())
    }
}

/// SASL numerics (900-908), translated from raw numeric replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaslReply {
    /// 900 RPL_LOGGEDIN
    LoggedIn {
        /// Account now logged in.
        account: String,
    },
    /// 901 RPL_LOGGEDOUT
    LoggedOut,
    /// 902 ERR_NICKLOCKED
    NickLocked,
    /// 903 RPL_SASLSUCCESS
    Success,
    /// 904 ERR_SASLFAIL
    Failed,
    /// 905 ERR_SASLTOOLONG
    TooLong,
    /// 906 ERR_SASLABORTED
    Aborted,
    /// 907 ERR_SASLALREADY
    AlreadyAuthenticated,
    /// 908 RPL_SASLMECHS
    Mechanisms(Vec<String>),
}

impl SaslReply {
    /// Numeric code of this reply.
    pub fn code(&self) -> u16 {
        match self {
            Self::LoggedIn { .. } => 900,
            Self::LoggedOut => 901,
            Self::NickLocked => 902,
            Self::Success => 903,
            Self::Failed => 904,
            Self::TooLong => 905,
            Self::Aborted => 906,
            Self::AlreadyAuthenticated => 907,
            Self::Mechanisms(_) => 908,
        }
    }

    /// Translate a raw numeric. `params` excludes the code and starts with
    /// the client's nick, as sent by the server.
    pub fn from_numeric(code: u16, params: &[String]) -> Option<Self> {
        let reply = match code {
            900 => Self::LoggedIn {
                account: params.get(2).cloned().unwrap_or_default(),
            },
            901 => Self::LoggedOut,
            902 => Self::NickLocked,
            903 => Self::Success,
            904 => Self::Failed,
            905 => Self::TooLong,
            906 => Self::Aborted,
            907 => Self::AlreadyAuthenticated,
            908 => Self::Mechanisms(
                params
                    .get(1)
                    .map(|list| {
                        list.split(',')
                            .map(str::trim)
                            .filter(|m| !m.is_empty())
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            _ => return None,
        };
        Some(reply)
    }

    /// Whether this reply ends the current mechanism unsuccessfully.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TooLong)
    }
}

/// Coarse grouping used for double dispatch. One handler overload per family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KindFamily {
    Nick,
    Cap,
    Authenticate,
    Sasl,
    Numeric,
    Message,
    Membership,
    Quit,
    Ping,
    Pong,
    Error,
    Raw,
}

/// Event payload, one variant per concrete kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// NICK: a change request (outbound) or confirmation (inbound).
    Nick { nick: String },
    /// CAP with its sub-command.
    Cap {
        sub: CapSubCommand,
        caps: Vec<CapEntry>,
        /// Set on listing fragments followed by more fragments.
        more: bool,
        /// Negotiation version sent with `CAP LS`.
        version: Option<u16>,
    },
    /// AUTHENTICATE with a mechanism name, `+`, `*` or a base64 chunk.
    Authenticate { payload: String },
    /// A translated SASL numeric.
    Sasl { reply: SaslReply, text: Option<String> },
    /// Any numeric reply. `params` excludes the code.
    Numeric { code: u16, params: Vec<String> },
    Privmsg { targets: Vec<String>, text: String },
    Notice { targets: Vec<String>, text: String },
    Join { channel: String, key: Option<String> },
    Part { channel: String, reason: Option<String> },
    Quit { reason: Option<String> },
    Ping { token: String },
    Pong { token: String },
    Error { message: String },
    /// Anything the engine has no dedicated kind for.
    Raw { command: String, params: Vec<String> },
}

impl EventKind {
    /// Every value [`name`](Self::name) can return.
    pub const NAMES: [&'static str; 14] = [
        "NICK",
        "CAP",
        "AUTHENTICATE",
        "SASL",
        "NUMERIC",
        "PRIVMSG",
        "NOTICE",
        "JOIN",
        "PART",
        "QUIT",
        "PING",
        "PONG",
        "ERROR",
        "RAW",
    ];

    /// Short kind name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nick { .. } => "NICK",
            Self::Cap { .. } => "CAP",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Sasl { .. } => "SASL",
            Self::Numeric { .. } => "NUMERIC",
            Self::Privmsg { .. } => "PRIVMSG",
            Self::Notice { .. } => "NOTICE",
            Self::Join { .. } => "JOIN",
            Self::Part { .. } => "PART",
            Self::Quit { .. } => "QUIT",
            Self::Ping { .. } => "PING",
            Self::Pong { .. } => "PONG",
            Self::Error { .. } => "ERROR",
            Self::Raw { .. } => "RAW",
        }
    }

    /// Dispatch family of this kind.
    pub fn family(&self) -> KindFamily {
        match self {
            Self::Nick { .. } => KindFamily::Nick,
            Self::Cap { .. } => KindFamily::Cap,
            Self::Authenticate { .. } => KindFamily::Authenticate,
            Self::Sasl { .. } => KindFamily::Sasl,
            Self::Numeric { .. } => KindFamily::Numeric,
            Self::Privmsg { .. } | Self::Notice { .. } => KindFamily::Message,
            Self::Join { .. } | Self::Part { .. } => KindFamily::Membership,
            Self::Quit { .. } => KindFamily::Quit,
            Self::Ping { .. } => KindFamily::Ping,
            Self::Pong { .. } => KindFamily::Pong,
            Self::Error { .. } => KindFamily::Error,
            Self::Raw { .. } => KindFamily::Raw,
        }
    }

    pub fn carries_text(&self) -> bool {
        matches!(
            self,
            Self::Privmsg { .. }
                | Self::Notice { .. }
                | Self::Part { .. }
                | Self::Quit { .. }
                | Self::Error { .. }
                | Self::Sasl { .. }
        )
    }

    pub fn carries_channel(&self) -> bool {
        match self {
            Self::Join { .. } | Self::Part { .. } => true,
            Self::Privmsg { targets, .. } | Self::Notice { targets, .. } => {
                targets.iter().any(|t| is_channel_name(t))
            }
            _ => false,
        }
    }

    pub fn carries_multiple_targets(&self) -> bool {
        matches!(self, Self::Privmsg { .. } | Self::Notice { .. })
    }

    pub fn is_command(&self) -> bool {
        !self.is_numeric_response()
    }

    pub fn is_numeric_response(&self) -> bool {
        matches!(self, Self::Numeric { .. } | Self::Sasl { .. })
    }

    /// Target names, in wire order.
    pub fn targets(&self) -> Option<&[String]> {
        match self {
            Self::Privmsg { targets, .. } | Self::Notice { targets, .. } => Some(targets),
            Self::Join { channel, .. } | Self::Part { channel, .. } => {
                Some(std::slice::from_ref(channel))
            }
            _ => None,
        }
    }

    /// Free-text payload, if the kind has one and it is set.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Privmsg { text, .. } | Self::Notice { text, .. } => Some(text),
            Self::Part { reason, .. } | Self::Quit { reason } => reason.as_deref(),
            Self::Error { message } => Some(message),
            Self::Sasl { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_entry_parses_values_and_modifiers() {
        let entry = CapEntry::parse("sasl=PLAIN,EXTERNAL");
        assert_eq!(entry.name, "sasl");
        assert_eq!(entry.value.as_deref(), Some("PLAIN,EXTERNAL"));
        assert!(!entry.disabled);

        let entry = CapEntry::parse("-multi-prefix");
        assert_eq!(entry.name, "multi-prefix");
        assert!(entry.disabled);
        assert_eq!(entry.token(), "-multi-prefix");

        assert_eq!(CapEntry::parse("~ack").name, "ack");
    }

    #[test]
    fn cap_entry_display_roundtrips_token() {
        let list = CapEntry::parse_list("  a  b=1 -c ");
        let shown: Vec<_> = list.iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["a", "b=1", "-c"]);
    }

    #[test]
    fn sasl_reply_translation() {
        let params = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            SaslReply::from_numeric(908, &params(&["bot", "PLAIN, EXTERNAL", "are available"])),
            Some(SaslReply::Mechanisms(vec!["PLAIN".into(), "EXTERNAL".into()]))
        );
        assert_eq!(
            SaslReply::from_numeric(900, &params(&["bot", "bot!b@h", "acct", "logged in"])),
            Some(SaslReply::LoggedIn {
                account: "acct".into()
            })
        );
        assert_eq!(SaslReply::from_numeric(433, &[]), None);
        assert_eq!(SaslReply::Failed.code(), 904);
        assert!(SaslReply::TooLong.is_failure());
        assert!(!SaslReply::Aborted.is_failure());
    }

    #[test]
    fn structural_capabilities() {
        let msg = EventKind::Privmsg {
            targets: vec!["bob".into(), "#rust".into()],
            text: "hi".into(),
        };
        assert!(msg.carries_text());
        assert!(msg.carries_channel());
        assert!(msg.carries_multiple_targets());
        assert!(msg.is_command());

        let direct = EventKind::Notice {
            targets: vec!["bob".into()],
            text: "hi".into(),
        };
        assert!(!direct.carries_channel());

        let numeric = EventKind::Numeric {
            code: 433,
            params: vec![],
        };
        assert!(numeric.is_numeric_response());
        assert!(!numeric.is_command());
        assert!(numeric.targets().is_none());

        let join = EventKind::Join {
            channel: "#rust".into(),
            key: None,
        };
        assert_eq!(join.targets(), Some(&["#rust".to_string()][..]));
        assert_eq!(join.family(), KindFamily::Membership);
    }
}
