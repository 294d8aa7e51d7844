use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::clock::Clock;
use crate::feed::protocol::{parse_frame, Frame, Subscription};
use crate::tracker::Tracker;

pub const AISSTREAM_URL: &str = "wss://stream.aisstream.io/v0/stream";
pub const API_KEY_ENV: &str = "AISSTREAM_API_KEY";

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    pub api_key: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// A connection that delivers nothing for this long is treated as dead.
    pub idle_timeout: Duration,
}

impl FeedConfig {
    /// Fails when the credential is empty: without it the upstream accepts
    /// the connection and then closes it, which would retry forever.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(anyhow!("{API_KEY_ENV} is empty"));
        }
        Ok(Self {
            url: Url::parse(AISSTREAM_URL).context("parse default upstream url")?,
            api_key,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            idle_timeout: IDLE_TIMEOUT,
        })
    }

    /// Reads the credential from `AISSTREAM_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).with_context(|| format!("{API_KEY_ENV} not set"))?;
        Self::new(api_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Exponential reconnect delay: doubles per consecutive failure, capped,
/// and back to the initial delay once a session delivers a message.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn peek(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Routes a parsed frame to the tracker. Store failures are logged and the
/// frame is considered handled; the next frame is processed normally.
pub fn dispatch<C: Clock>(tracker: &mut Tracker<C>, frame: Frame) {
    let mmsi = frame.mmsi();
    let result = match frame {
        Frame::Identity { mmsi, name } => tracker.observe_identity(mmsi, &name).map(|_| ()),
        Frame::Position { mmsi, report } => tracker.observe_position(mmsi, &report).map(|_| ()),
    };
    if let Err(err) = result {
        error!("write failed for MMSI={mmsi}: {err}");
    }
}

/// Parses and dispatches one raw payload. Returns false if it was dropped.
pub fn handle_payload<C: Clock>(tracker: &mut Tracker<C>, bytes: &mut [u8]) -> bool {
    match parse_frame(bytes) {
        Ok(frame) => {
            dispatch(tracker, frame);
            true
        }
        Err(err) => {
            debug!("dropping frame: {err}");
            false
        }
    }
}

/// Flips `shutdown` to true once `signal` fires. If the signal cannot be
/// installed the error is logged and the sender is held forever, so the
/// feed keeps running instead of reading the dropped sender as a shutdown.
pub async fn forward_shutdown<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested");
            let _ = shutdown.send(true);
        }
        Err(err) => {
            error!("Failed to install shutdown signal handler: {err}");
            std::future::pending::<()>().await;
            drop(shutdown);
        }
    }
}

pub struct FeedClient {
    config: FeedConfig,
    state: ConnectionState,
    backoff: Backoff,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        let backoff = Backoff::new(config.initial_backoff, config.max_backoff);
        Self {
            config,
            state: ConnectionState::Disconnected,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Connection failures never end the loop: every lost session is
    /// followed by a backoff sleep and a fresh connect. Reports that arrive
    /// while disconnected are lost.
    pub async fn run<C: Clock>(
        &mut self,
        tracker: &mut Tracker<C>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.transition(ConnectionState::Connecting);
            let connected = tokio::select! {
                res = self.connect_and_subscribe() => res,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(ws) => {
                    self.transition(ConnectionState::Connected);
                    match self.pump(ws, tracker, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Lost(reason) => warn!("Connection lost: {reason}"),
                    }
                }
                Err(err) => error!("Connection failed: {err:#}"),
            }

            self.transition(ConnectionState::Disconnected);
            info!("stats: {:?}", tracker.stats());

            let delay = self.backoff.next_delay();
            warn!("Reconnecting in {}s...", delay.as_secs());
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.transition(ConnectionState::Disconnected);
        info!("Feed stopped. stats: {:?}", tracker.stats());
        Ok(())
    }

    async fn connect_and_subscribe(&self) -> Result<WsStream> {
        info!("Connecting to {}", self.config.url);
        let (mut ws, _) = connect_async(self.config.url.clone())
            .await
            .context("Failed to connect")?;
        let subscription = Subscription::global(&self.config.api_key)
            .to_json()
            .context("Failed to encode subscription")?;
        ws.send(Message::Text(subscription))
            .await
            .context("Failed to send subscription")?;
        Ok(ws)
    }

    async fn pump<C: Clock>(
        &mut self,
        mut ws: WsStream,
        tracker: &mut Tracker<C>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                next = timeout(self.config.idle_timeout, ws.next()) => next,
                _ = shutdown.changed() => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Shutdown;
                }
            };

            let msg = match next {
                Err(_) => {
                    return SessionEnd::Lost(format!(
                        "no messages for {}s",
                        self.config.idle_timeout.as_secs()
                    ))
                }
                Ok(None) => return SessionEnd::Lost("stream ended".to_string()),
                Ok(Some(Err(err))) => return SessionEnd::Lost(err.to_string()),
                Ok(Some(Ok(msg))) => msg,
            };

            match msg {
                Message::Text(text) => {
                    self.backoff.reset();
                    let mut bytes = text.into_bytes();
                    handle_payload(tracker, &mut bytes);
                }
                Message::Binary(mut bytes) => {
                    self.backoff.reset();
                    handle_payload(tracker, &mut bytes);
                }
                Message::Ping(ping) => {
                    if let Err(err) = ws.send(Message::Pong(ping)).await {
                        return SessionEnd::Lost(err.to_string());
                    }
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("code={} reason={}", f.code, f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return SessionEnd::Lost(format!("server closed ({reason})"));
                }
                _ => {}
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("feed {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_caps_and_resets() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30, 30]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.peek(), Duration::from_secs(4));
    }

    #[test]
    fn config_requires_credential() {
        assert!(FeedConfig::new("   ").is_err());
        let config = FeedConfig::new(" key ").expect("config");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.url.as_str(), AISSTREAM_URL);
    }

    #[test]
    fn client_starts_disconnected() {
        let client = FeedClient::new(FeedConfig::new("key").expect("config"));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn signal_forwarding() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(forward_shutdown(async { Ok(()) }, tx));
        rx.changed().await.expect("shutdown sent");
        assert!(*rx.borrow());

        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(forward_shutdown(
            async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signals")) },
            tx,
        ));
        let waited = timeout(Duration::from_millis(100), rx.changed()).await;
        assert!(waited.is_err(), "sender must stay alive");
        assert!(!*rx.borrow());
    }
}
