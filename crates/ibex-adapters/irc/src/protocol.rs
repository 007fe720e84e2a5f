//! IRC line parsing and the handful of commands the source sends.
//!
//! Parsing is lenient: anything with a command is accepted, and the caller
//! decides what to do with parameters it does not expect.

/// CTCP delimiter.
pub const CTCP_DELIM: char = '\x01';

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw IRCv3 tags, without the leading `@`.
    pub tags: Option<String>,
    /// `nick!user@host` or a server name.
    pub prefix: Option<String>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parses one line, with or without its line ending.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = None;
        if let Some(tagged) = rest.strip_prefix('@') {
            let (raw, after) = tagged.split_once(' ')?;
            tags = Some(raw.to_string());
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (raw, after) = prefixed.split_once(' ')?;
            prefix = Some(raw.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, after)) => (command, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The nick part of a user prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    /// Value of an IRCv3 tag; `Some("")` for a tag without a value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_deref()?.split(';').find_map(|tag| match tag.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if tag == key => Some(""),
            _ => None,
        })
    }
}

/// Splits a CTCP payload into command and arguments.
pub fn parse_ctcp(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    let (command, args) = inner.split_once(' ').unwrap_or((inner, ""));
    (!command.is_empty()).then_some((command, args))
}

/// Returns the rest of `text` when it starts with `nick:` or `nick,`.
pub fn strip_address<'a>(text: &'a str, nick: &str) -> Option<&'a str> {
    let head = text.get(..nick.len())?;
    if !head.eq_ignore_ascii_case(nick) {
        return None;
    }
    let rest = text[nick.len()..].strip_prefix([':', ','])?;
    Some(rest.trim_start())
}

/// Folds newlines into spaces and cuts to at most `max` bytes, on a
/// character boundary.
pub fn sanitize(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max));
    for c in text.chars() {
        let c = if matches!(c, '\r' | '\n') { ' ' } else { c };
        if out.len() + c.len_utf8() > max {
            break;
        }
        out.push(c);
    }
    out
}

/// Outgoing commands, without line endings.
pub mod command {
    use super::CTCP_DELIM;

    pub fn pass(password: &str) -> String {
        format!("PASS {password}")
    }

    pub fn nick(nick: &str) -> String {
        format!("NICK {nick}")
    }

    pub fn user(username: &str, realname: &str) -> String {
        format!("USER {username} 0 * :{realname}")
    }

    pub fn mode(target: &str, modes: &str) -> String {
        format!("MODE {target} {modes}")
    }

    pub fn join(channel: &str) -> String {
        format!("JOIN {channel}")
    }

    pub fn part(channel: &str) -> String {
        format!("PART {channel}")
    }

    pub fn privmsg(target: &str, text: &str) -> String {
        format!("PRIVMSG {target} :{text}")
    }

    pub fn action(target: &str, text: &str) -> String {
        format!("PRIVMSG {target} :{CTCP_DELIM}ACTION {text}{CTCP_DELIM}")
    }

    pub fn ctcp_reply(target: &str, command: &str, text: &str) -> String {
        format!("NOTICE {target} :{CTCP_DELIM}{command} {text}{CTCP_DELIM}")
    }

    pub fn pong(token: &str) -> String {
        format!("PONG :{token}")
    }

    pub fn whois(nick: &str) -> String {
        format!("WHOIS {nick}")
    }

    pub fn quit(reason: &str) -> String {
        format!("QUIT :{reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let msg = Message::parse("@account=alice;time=now :alice!a@host PRIVMSG #ibex :ibex: hello there\r\n").unwrap();

        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, ["#ibex", "ibex: hello there"]);
        assert_eq!(msg.nick(), Some("alice"));
        assert_eq!(msg.tag("account"), Some("alice"));
        assert_eq!(msg.tag("missing"), None);
    }

    #[test]
    fn test_parse_without_prefix_or_trailing() {
        let msg = Message::parse("ping irc.example.org").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, ["irc.example.org"]);
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.nick(), None);

        let msg = Message::parse(":irc.example.org 001 ibex :Welcome").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.param(0), Some("ibex"));
        assert_eq!(msg.param(1), Some("Welcome"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse(":lonely-prefix").is_none());
        assert!(Message::parse("@tags-only").is_none());
    }

    #[test]
    fn test_ctcp() {
        assert_eq!(parse_ctcp("\x01ACTION waves\x01"), Some(("ACTION", "waves")));
        assert_eq!(parse_ctcp("\x01VERSION\x01"), Some(("VERSION", "")));
        assert_eq!(parse_ctcp("plain"), None);
    }

    #[test]
    fn test_strip_address() {
        assert_eq!(strip_address("ibex: help", "ibex"), Some("help"));
        assert_eq!(strip_address("IBEX,help", "ibex"), Some("help"));
        assert_eq!(strip_address("ibexes are goats", "ibex"), None);
        assert_eq!(strip_address("ibe", "ibex"), None);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("one\ntwo\r\nthree", 100), "one two  three");
        assert_eq!(sanitize("ééééé", 3), "é");
        assert_eq!(sanitize("ééééé", 4), "éé");

        let long = "日".repeat(490);
        let cut = sanitize(&long, 490);
        assert!(cut.len() <= 490);
        assert_eq!(cut.chars().count(), 163);
    }

    #[test]
    fn test_commands() {
        assert_eq!(command::user("ibex", "Ibex Bot"), "USER ibex 0 * :Ibex Bot");
        assert_eq!(command::action("#ibex", "waves"), "PRIVMSG #ibex :\x01ACTION waves\x01");
        assert_eq!(command::pong("irc.example.org"), "PONG :irc.example.org");
    }
}
