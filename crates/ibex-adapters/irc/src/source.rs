//! The IRC [`Source`] implementation.
//!
//! A connection is two tasks: a writer draining an outbound queue into the
//! socket, and a reader turning lines into events. Every event is dispatched
//! on its own task so a slow handler never stalls the read loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ibex_core::{
    BoxedSink, BoxedSource, Event, EventKind, Response, Source, SourceError, SourceResult,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, trace, warn};

use crate::config::IrcConfig;
use crate::protocol::{self, Message, command};

/// Longest line accepted from the server, tags included.
const MAX_LINE_LENGTH: usize = 8192;

/// Depth of the outbound queue.
const OUTBOUND_CAPACITY: usize = 256;

/// An IRC network connection.
#[derive(Clone)]
pub struct IrcSource {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    config: IrcConfig,
    /// Current nick; the server may assign a different one than configured.
    nick: RwLock<String>,
    connected: AtomicBool,
    connection: Mutex<Option<Connection>>,
    generations: AtomicU64,
    /// Pending identity checks by lower-cased nick.
    whois: Mutex<HashMap<String, Vec<oneshot::Sender<bool>>>>,
}

/// Handles to the tasks of one connection. A read loop only tears down the
/// connection whose generation it was started with.
struct Connection {
    generation: u64,
    outbound: mpsc::Sender<String>,
    shutdown: watch::Sender<bool>,
}

impl IrcSource {
    pub fn new(name: impl Into<String>, config: IrcConfig) -> Self {
        let nick = config.nick.clone();
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                nick: RwLock::new(nick),
                connected: AtomicBool::new(false),
                connection: Mutex::new(None),
                generations: AtomicU64::new(0),
                whois: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Source factory for the `irc` kind.
    pub fn from_settings(name: &str, settings: &Value) -> SourceResult<BoxedSource> {
        let config = IrcConfig::from_settings(settings)?;
        Ok(Arc::new(Self::new(name, config)))
    }

    pub fn config(&self) -> &IrcConfig {
        &self.shared.config
    }

    /// The nick currently in use.
    pub fn nick(&self) -> String {
        self.shared.nick.read().clone()
    }

    /// Queues a raw line.
    async fn queue(&self, line: String) -> SourceResult<()> {
        let outbound = self
            .shared
            .connection
            .lock()
            .as_ref()
            .map(|c| c.outbound.clone())
            .ok_or_else(|| SourceError::not_connected(&self.shared.name))?;
        outbound
            .send(line)
            .await
            .map_err(|_| SourceError::not_connected(&self.shared.name))
    }

    // ─── Read loop ────────────────────────────────────────────────────────────

    async fn read_loop(
        self,
        mut lines: FramedRead<OwnedReadHalf, LinesCodec>,
        mut shutdown: watch::Receiver<bool>,
        generation: u64,
        sink: BoxedSink,
    ) {
        let name = self.shared.name.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(source = %name, "Read loop stopping");
                    break;
                }
                line = lines.next() => match line {
                    Some(Ok(line)) => self.handle_line(&line, &sink).await,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!(source = %name, "Discarding overlong line");
                    }
                    Some(Err(e)) => {
                        warn!(source = %name, error = %e, "Connection error");
                        break;
                    }
                    None => {
                        info!(source = %name, "Server closed the connection");
                        break;
                    }
                },
            }
        }
        self.connection_closed(generation);
    }

    async fn handle_line(&self, line: &str, sink: &BoxedSink) {
        trace!(source = %self.shared.name, line = %line, "Received");
        let Some(msg) = Message::parse(line) else {
            debug!(source = %self.shared.name, line = %line, "Unparseable line");
            return;
        };
        if msg.command == "PRIVMSG" && self.answer_ctcp(&msg).await {
            return;
        }

        match msg.command.as_str() {
            "PING" => {
                let token = msg.param(0).unwrap_or_default();
                self.queue_or_log(command::pong(token)).await;
            }
            "001" => self.signed_on(&msg).await,
            "433" => {
                // Nick in use during registration.
                let nick = format!("{}_", self.nick());
                *self.shared.nick.write() = nick.clone();
                self.queue_or_log(command::nick(&nick)).await;
            }
            "NICK" => {
                if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(&self.nick()))
                    && let Some(nick) = msg.param(0)
                {
                    *self.shared.nick.write() = nick.to_string();
                }
            }
            // RPL_WHOISREGNICK
            "307" => self.resolve_whois(msg.param(1), true),
            // RPL_WHOISACCOUNT: only the account named after the nick counts.
            "330" => {
                let identified = msg
                    .param(1)
                    .zip(msg.param(2))
                    .is_some_and(|(nick, account)| nick.eq_ignore_ascii_case(account));
                self.resolve_whois(msg.param(1), identified);
            }
            // RPL_WHOISSPECIAL carries free text; trust only the services line.
            "320" if msg
                .param(2)
                .is_some_and(|text| text.trim().eq_ignore_ascii_case("is identified to services")) =>
            {
                self.resolve_whois(msg.param(1), true);
            }
            // RPL_ENDOFWHOIS
            "318" => self.resolve_whois(msg.param(1), false),
            _ => {
                if let Some(event) = event_for(&self.shared.name, &self.nick(), &msg) {
                    self.spawn_dispatch(event, Arc::clone(sink));
                }
            }
        }
    }

    async fn signed_on(&self, msg: &Message) {
        if let Some(nick) = msg.param(0) {
            *self.shared.nick.write() = nick.to_string();
        }
        let nick = self.nick();
        if let Some(modes) = &self.shared.config.modes {
            self.queue_or_log(command::mode(&nick, modes)).await;
        }
        for channel in &self.shared.config.channels {
            self.queue_or_log(command::join(channel)).await;
        }
        info!(source = %self.shared.name, nick = %nick, "Signed on");
    }

    /// Answers CTCP VERSION. Returns whether the message was consumed.
    async fn answer_ctcp(&self, msg: &Message) -> bool {
        let (Some(sender), Some(text)) = (msg.nick(), msg.param(1)) else {
            return false;
        };
        match protocol::parse_ctcp(text) {
            Some((ctcp, _)) if ctcp.eq_ignore_ascii_case("VERSION") => {
                let version = format!("Ibex {}", env!("CARGO_PKG_VERSION"));
                self.queue_or_log(command::ctcp_reply(sender, "VERSION", &version)).await;
                true
            }
            _ => false,
        }
    }

    fn spawn_dispatch(&self, event: Event, sink: BoxedSink) {
        let source = self.clone();
        tokio::spawn(async move {
            let done = sink.dispatch(event).await;
            source.deliver(&done).await;
        });
    }

    fn resolve_whois(&self, nick: Option<&str>, identified: bool) {
        let Some(nick) = nick else {
            return;
        };
        if let Some(waiters) = self.shared.whois.lock().remove(&nick.to_lowercase()) {
            debug!(source = %self.shared.name, nick = %nick, identified, "Identity resolved");
            for waiter in waiters {
                let _ = waiter.send(identified);
            }
        }
    }

    async fn queue_or_log(&self, line: String) {
        if let Err(e) = self.queue(line).await {
            warn!(source = %self.shared.name, error = %e, "Couldn't queue line");
        }
    }

    fn connection_closed(&self, generation: u64) {
        let mut connection = self.shared.connection.lock();
        if connection.as_ref().is_none_or(|c| c.generation != generation) {
            // Torn down by disconnect, possibly followed by a new connect.
            debug!(source = %self.shared.name, generation, "Read loop finished");
            return;
        }
        connection.take();
        self.shared.connected.store(false, Ordering::SeqCst);
        drop(connection);
        // Dropping the senders resolves pending checks as "not identified".
        self.shared.whois.lock().clear();
        info!(source = %self.shared.name, "Disconnected");
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::Receiver<String>, name: String) {
    while let Some(line) = outbound.recv().await {
        trace!(source = %name, line = %line, "Sending");
        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");
        if let Err(e) = writer.write_all(&bytes).await {
            warn!(source = %name, error = %e, "Write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[async_trait]
impl Source for IrcSource {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, sink: BoxedSink) -> SourceResult<()> {
        if self.shared.connected.swap(true, Ordering::SeqCst) {
            return Err(SourceError::AlreadyConnected {
                source_name: self.shared.name.clone(),
            });
        }

        let config = &self.shared.config;
        let address = config.address();
        info!(source = %self.shared.name, address = %address, "Connecting");
        let stream = match TcpStream::connect((config.server.as_str(), config.port)).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.connected.store(false, Ordering::SeqCst);
                return Err(SourceError::connection(address, e));
            }
        };
        let (reader, writer) = stream.into_split();

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let generation = self.shared.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.nick.write() = config.nick.clone();
        *self.shared.connection.lock() = Some(Connection {
            generation,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });

        tokio::spawn(write_loop(writer, outbound_rx, self.shared.name.clone()));

        if let Some(password) = &config.password {
            self.queue(command::pass(password)).await?;
        }
        self.queue(command::nick(&config.nick)).await?;
        self.queue(command::user(config.username(), config.realname())).await?;

        let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        tokio::spawn(self.clone().read_loop(lines, shutdown_rx, generation, sink));

        info!(source = %self.shared.name, "Connected");
        Ok(())
    }

    async fn disconnect(&self) -> SourceResult<()> {
        if !self.is_connected() {
            return Err(SourceError::not_connected(&self.shared.name));
        }
        self.queue_or_log(command::quit("Leaving")).await;

        // The writer drains the queue, sending QUIT, once its sender is gone.
        let connection = self.shared.connection.lock().take();
        if let Some(connection) = connection {
            let _ = connection.shutdown.send(true);
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.whois.lock().clear();
        info!(source = %self.shared.name, "Disconnected");
        Ok(())
    }

    async fn join(&self, channel: &str) -> SourceResult<()> {
        info!(source = %self.shared.name, channel = %channel, "Joining");
        self.queue(command::join(channel)).await
    }

    async fn part(&self, channel: &str) -> SourceResult<()> {
        info!(source = %self.shared.name, channel = %channel, "Leaving");
        self.queue(command::part(channel)).await
    }

    async fn send(&self, response: &Response) -> SourceResult<()> {
        let target = response
            .target()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::Protocol("response has no target".to_string()))?;
        let text = protocol::sanitize(&response.text, self.shared.config.max_message_length);

        let line = if response.action {
            command::action(target, &text)
        } else {
            command::privmsg(target, &text)
        };
        debug!(source = %self.shared.name, target = %target, action = response.action, "Sending response");
        self.queue(line).await
    }

    async fn verify_identity(&self, nick: &str) -> SourceResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .whois
            .lock()
            .entry(nick.to_lowercase())
            .or_default()
            .push(tx);
        self.queue(command::whois(nick)).await?;

        let timeout = Duration::from_secs(self.shared.config.whois_timeout_secs);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(identified)) => Ok(identified),
            Ok(Err(_)) => Ok(false),
            Err(_) => {
                warn!(source = %self.shared.name, nick = %nick, "WHOIS timed out");
                Ok(false)
            }
        }
    }
}

// ─── Event translation ────────────────────────────────────────────────────────

/// Translates a server line into an event, or `None` for lines that carry
/// nothing for processors.
pub fn event_for(source: &str, me: &str, msg: &Message) -> Option<Event> {
    let sender = msg.prefix.as_deref()?;
    let nick = msg.nick()?;
    let user_event = |kind: EventKind, channel: &str| {
        let event = Event::new(source, kind)
            .with_sender(sender, nick)
            .with_channel(channel)
            .public(true);
        match msg.tag("account").filter(|a| !a.is_empty() && *a != "*") {
            Some(account) => event.with_account(account),
            None => event,
        }
    };

    match msg.command.as_str() {
        "PRIVMSG" | "NOTICE" => {
            let target = msg.param(0)?;
            let mut text = msg.param(1)?;
            let kind = if msg.command == "NOTICE" {
                EventKind::Notice
            } else {
                EventKind::Message
            };

            let mut action = false;
            if let Some((ctcp, args)) = protocol::parse_ctcp(text) {
                if !ctcp.eq_ignore_ascii_case("ACTION") {
                    return None;
                }
                action = true;
                text = args;
            }

            let mut event = if target.eq_ignore_ascii_case(me) {
                user_event(kind, nick)
                    .with_message(text)
                    .public(false)
                    .addressed(true)
            } else {
                match protocol::strip_address(text, me) {
                    Some(rest) => user_event(kind, target).with_message(rest).addressed(true),
                    None => user_event(kind, target).with_message(text),
                }
            };
            if action {
                event = event.with_extra("action", true);
            }
            Some(event)
        }
        "JOIN" => Some(user_event(EventKind::State, msg.param(0)?).with_state("joined")),
        "PART" => {
            let event = user_event(EventKind::State, msg.param(0)?).with_state("parted");
            Some(match msg.param(1) {
                Some(reason) => event.with_message(reason),
                None => event,
            })
        }
        "QUIT" => {
            let event = user_event(EventKind::State, "").with_state("quit");
            Some(match msg.param(0) {
                Some(reason) => event.with_message(reason),
                None => event,
            })
        }
        "KICK" => {
            let channel = msg.param(0)?;
            let kicked = msg.param(1)?;
            let event = Event::new(source, EventKind::State)
                .with_sender(kicked, kicked)
                .with_channel(channel)
                .public(true)
                .with_state("kicked")
                .with_kicker(nick);
            Some(match msg.param(2) {
                Some(reason) => event.with_message(reason),
                None => event,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader, Lines};
    use tokio::net::TcpListener;

    use super::*;

    fn event(line: &str) -> Option<Event> {
        event_for("libera", "ibex", &Message::parse(line).unwrap())
    }

    #[test]
    fn test_public_message() {
        let event = event(":alice!a@host PRIVMSG #ibex :hello all").unwrap();

        assert_eq!(event.kind, EventKind::Message);
        assert_eq!(event.sender, "alice!a@host");
        assert_eq!(event.sender_id, "alice");
        assert_eq!(event.channel, "#ibex");
        assert_eq!(event.text(), "hello all");
        assert!(event.public);
        assert!(!event.addressed);
    }

    #[test]
    fn test_addressed_and_private() {
        let event = event(":alice!a@host PRIVMSG #ibex :Ibex, help").unwrap();
        assert!(event.addressed);
        assert_eq!(event.text(), "help");

        let event = event_for("libera", "ibex", &Message::parse(":alice!a@host NOTICE ibex :psst").unwrap()).unwrap();
        assert_eq!(event.kind, EventKind::Notice);
        assert_eq!(event.channel, "alice");
        assert!(event.addressed);
        assert!(!event.public);
    }

    #[test]
    fn test_action_and_account_tag() {
        let event = event("@account=alice :alice!a@host PRIVMSG #ibex :\x01ACTION waves\x01").unwrap();

        assert_eq!(event.text(), "waves");
        assert_eq!(event.extra.get("action"), Some(&json!(true)));
        assert_eq!(event.account.as_deref(), Some("alice"));

        assert!(self::event(":alice!a@host PRIVMSG #ibex :\x01PING 123\x01").is_none());
    }

    #[test]
    fn test_state_events() {
        let joined = event(":alice!a@host JOIN #ibex").unwrap();
        assert_eq!(joined.kind, EventKind::State);
        assert_eq!(joined.state.as_deref(), Some("joined"));

        let parted = event(":alice!a@host PART #ibex :bye").unwrap();
        assert_eq!(parted.state.as_deref(), Some("parted"));
        assert_eq!(parted.text(), "bye");

        let quit = event(":alice!a@host QUIT :Ping timeout").unwrap();
        assert_eq!(quit.state.as_deref(), Some("quit"));

        let kicked = event(":op!o@host KICK #ibex alice :behave").unwrap();
        assert_eq!(kicked.state.as_deref(), Some("kicked"));
        assert_eq!(kicked.sender_id, "alice");
        assert_eq!(kicked.kicker.as_deref(), Some("op"));
        assert_eq!(kicked.text(), "behave");

        assert!(event(":irc.example.org 372 ibex :motd").is_none());
    }

    // ─── Live connection ──────────────────────────────────────────────────────

    struct Pong;

    #[async_trait]
    impl ibex_core::EventSink for Pong {
        async fn dispatch(&self, event: Event) -> Event {
            let replies = if event.addressed && event.text() == "ping" {
                vec![Response::new("pong")]
            } else {
                Vec::new()
            };
            event.finalize(replies)
        }
    }

    async fn expect(lines: &mut Lines<BufReader<OwnedReadHalf>>, prefix: &str) -> String {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let line = lines.next_line().await.unwrap().unwrap();
                if line.starts_with(prefix) {
                    return line;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let settings = json!({
            "server": "127.0.0.1",
            "port": port,
            "nick": "ibex",
            "channels": ["#ibex"],
            "modes": "+B",
            "max_message_length": 10
        });
        let source = IrcSource::new("libera", IrcConfig::from_settings(&settings).unwrap());

        source.connect(Arc::new(Pong)).await.unwrap();
        assert!(source.is_connected());
        assert!(source.connect(Arc::new(Pong)).await.is_err());

        let (server, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = server.into_split();
        let mut lines = BufReader::new(reader).lines();

        assert_eq!(expect(&mut lines, "NICK").await, "NICK ibex");
        assert_eq!(expect(&mut lines, "USER").await, "USER ibex 0 * :ibex");

        writer.write_all(b":irc.test 001 ibex :Welcome\r\n").await.unwrap();
        assert_eq!(expect(&mut lines, "MODE").await, "MODE ibex +B");
        assert_eq!(expect(&mut lines, "JOIN").await, "JOIN #ibex");

        writer.write_all(b"PING :irc.test\r\n").await.unwrap();
        assert_eq!(expect(&mut lines, "PONG").await, "PONG :irc.test");

        writer.write_all(b":alice!a@host PRIVMSG #ibex :ibex: ping\r\n").await.unwrap();
        assert_eq!(expect(&mut lines, "PRIVMSG").await, "PRIVMSG #ibex :pong");

        source
            .send(&Response::new("a very long\nreply").to("alice").as_action())
            .await
            .unwrap();
        assert_eq!(expect(&mut lines, "PRIVMSG").await, "PRIVMSG alice :\x01ACTION a very lon\x01");

        let checker = source.clone();
        let check = tokio::spawn(async move { checker.verify_identity("Alice").await });
        assert_eq!(expect(&mut lines, "WHOIS").await, "WHOIS Alice");
        writer
            .write_all(b":irc.test 330 ibex alice alice :is logged in as\r\n")
            .await
            .unwrap();
        assert!(check.await.unwrap().unwrap());

        let checker = source.clone();
        let check = tokio::spawn(async move { checker.verify_identity("mallory").await });
        expect(&mut lines, "WHOIS").await;
        writer
            .write_all(b":irc.test 318 ibex mallory :End of /WHOIS list.\r\n")
            .await
            .unwrap();
        assert!(!check.await.unwrap().unwrap());

        // Logged in, but to somebody else's account.
        let checker = source.clone();
        let check = tokio::spawn(async move { checker.verify_identity("bob").await });
        expect(&mut lines, "WHOIS").await;
        writer
            .write_all(b":irc.test 330 ibex bob mallory :is logged in as\r\n")
            .await
            .unwrap();
        assert!(!check.await.unwrap().unwrap());

        let checker = source.clone();
        let check = tokio::spawn(async move { checker.verify_identity("bob").await });
        expect(&mut lines, "WHOIS").await;
        writer
            .write_all(b":irc.test 320 ibex bob :is a network helper\r\n")
            .await
            .unwrap();
        writer
            .write_all(b":irc.test 320 ibex bob :is identified to services \r\n")
            .await
            .unwrap();
        assert!(check.await.unwrap().unwrap());

        source.disconnect().await.unwrap();
        assert!(!source.is_connected());
        assert!(expect(&mut lines, "QUIT").await.starts_with("QUIT :"));
        assert!(matches!(source.disconnect().await, Err(SourceError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn test_quick_reconnect_keeps_new_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let source = IrcSource::from_settings("libera", &json!({ "server": "127.0.0.1", "port": port, "nick": "ibex" }))
            .unwrap();

        source.connect(Arc::new(Pong)).await.unwrap();
        let (first, _) = listener.accept().await.unwrap();
        source.disconnect().await.unwrap();
        source.connect(Arc::new(Pong)).await.unwrap();
        let (second, _) = listener.accept().await.unwrap();

        // Let the first read loop notice its shutdown and finish.
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(first);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(source.is_connected());
        assert!(matches!(source.connect(Arc::new(Pong)).await, Err(SourceError::AlreadyConnected { .. })));

        let (reader, _writer) = second.into_split();
        let mut lines = BufReader::new(reader).lines();
        source.join("#later").await.unwrap();
        assert_eq!(expect(&mut lines, "JOIN").await, "JOIN #later");

        source.disconnect().await.unwrap();
        assert!(!source.is_connected());
        assert!(expect(&mut lines, "QUIT").await.starts_with("QUIT :"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = IrcSource::from_settings("libera", &json!({ "server": "127.0.0.1", "port": port, "nick": "ibex" }))
            .unwrap();
        let result = source.connect(Arc::new(Pong)).await;

        assert!(matches!(result, Err(SourceError::Connection { .. })));
        assert!(!source.is_connected());
        assert!(matches!(source.join("#ibex").await, Err(SourceError::NotConnected { .. })));
    }
}
