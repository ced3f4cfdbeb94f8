//! Outbound line serialization.
//!
//! Produces one protocol line without the trailing CRLF. Free text always
//! travels as the `:`-prefixed trailing parameter; any other final
//! parameter is prefixed only when it is empty, contains a space or starts
//! with `:`. Nothing is fragmented.

use std::fmt::Write;

use crate::event::{CapSubCommand, Event, EventKind};

/// Serialize an event to its wire form.
pub fn serialize(event: &Event) -> String {
    serialize_kind(event.kind())
}

pub fn serialize_kind(kind: &EventKind) -> String {
    let mut line = String::with_capacity(64);
    match kind {
        EventKind::Nick { nick } => {
            line.push_str("NICK ");
            push_last(&mut line, nick);
        }
        EventKind::Cap {
            sub,
            caps,
            version,
            ..
        } => {
            let _ = write!(line, "CAP {sub}");
            if let (CapSubCommand::Ls, Some(version)) = (sub, version) {
                let _ = write!(line, " {version}");
            }
            if !caps.is_empty() {
                let list: Vec<String> = caps.iter().map(ToString::to_string).collect();
                push_trailing(&mut line, &list.join(" "));
            }
        }
        EventKind::Authenticate { payload } => {
            line.push_str("AUTHENTICATE ");
            push_last(&mut line, payload);
        }
        EventKind::Sasl { reply, text } => {
            let _ = write!(line, "{:03}", reply.code());
            if let Some(text) = text {
                push_trailing(&mut line, text);
            }
        }
        EventKind::Numeric { code, params } => {
            let _ = write!(line, "{code:03}");
            push_params(&mut line, params);
        }
        EventKind::Privmsg { targets, text } => {
            let _ = write!(line, "PRIVMSG {}", targets.join(","));
            push_trailing(&mut line, text);
        }
        EventKind::Notice { targets, text } => {
            let _ = write!(line, "NOTICE {}", targets.join(","));
            push_trailing(&mut line, text);
        }
        EventKind::Join { channel, key } => {
            let _ = write!(line, "JOIN {channel}");
            if let Some(key) = key {
                line.push(' ');
                push_last(&mut line, key);
            }
        }
        EventKind::Part { channel, reason } => {
            let _ = write!(line, "PART {channel}");
            if let Some(reason) = reason {
                push_trailing(&mut line, reason);
            }
        }
        EventKind::Quit { reason } => {
            line.push_str("QUIT");
            if let Some(reason) = reason {
                push_trailing(&mut line, reason);
            }
        }
        EventKind::Ping { token } => {
            line.push_str("PING ");
            push_last(&mut line, token);
        }
        EventKind::Pong { token } => {
            line.push_str("PONG ");
            push_last(&mut line, token);
        }
        EventKind::Error { message } => {
            line.push_str("ERROR");
            push_trailing(&mut line, message);
        }
        EventKind::Raw { command, params } => {
            line.push_str(command);
            push_params(&mut line, params);
        }
    }
    line
}

fn needs_colon(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}

fn push_last(line: &mut String, param: &str) {
    if needs_colon(param) {
        line.push(':');
    }
    line.push_str(param);
}

fn push_trailing(line: &mut String, text: &str) {
    line.push_str(" :");
    line.push_str(text);
}

fn push_params(line: &mut String, params: &[String]) {
    let Some((last, middle)) = params.split_last() else {
        return;
    };
    for param in middle {
        line.push(' ');
        line.push_str(param);
    }
    line.push(' ');
    push_last(line, last);
}
