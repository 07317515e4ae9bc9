//! Relay core state machine.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::future::poll_fn;
use std::io;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use bytes::Bytes;
use shadowlink_config::Config;
use shadowlink_core::defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_PENDING_BYTES,
    DEFAULT_RELAY_BUFFER_SIZE,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant as TokioInstant;
use tracing::debug;

use crate::connector::{Upstream, UpstreamConnector};
use crate::error::{ClientError, RelayError};
use crate::relay::context::ClientConnection;
use crate::relay::framing::encode_frame;
use crate::relay::pump::{Direction, PumpPoll, PumpState, poll_pump};
use crate::relay::teardown::TeardownCoordinator;
use crate::socks5::send_success;

/// Tunables for one session.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Closes the session when the upstream sees no traffic for this long.
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Read buffer size per direction.
    pub buffer_size: usize,
    /// Client reads pause once this many bytes are queued during CONNECTING.
    pub max_pending_bytes: usize,
    /// Decrypt upstream bytes before writing them to the client.
    pub decode_inbound: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
            decode_inbound: false,
        }
    }
}

impl From<&Config> for RelayConfig {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            connect_timeout: config.connect_timeout(),
            buffer_size: config.relay_buffer_size,
            max_pending_bytes: config.max_pending_bytes,
            decode_inbound: config.decode_inbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Relaying,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Relaying => "relaying",
            Self::Closed => "closed",
        })
    }
}

/// Outcome of a finished session.
#[derive(Debug)]
pub struct SessionSummary {
    pub id: u64,
    /// Every state the session entered, in order.
    pub states: Vec<SessionState>,
    pub reason: RelayError,
    pub connect_attempts: u32,
    /// Client payload bytes sent upstream (before framing and encryption).
    pub bytes_up: u64,
    /// Bytes read from the upstream.
    pub bytes_down: u64,
    pub duration: Duration,
}

/// Client chunks held while the upstream dial is in flight.
#[derive(Debug, Default)]
struct PendingFrames {
    chunks: VecDeque<Bytes>,
    bytes: usize,
}

impl PendingFrames {
    fn push(&mut self, chunk: Bytes) {
        self.bytes += chunk.len();
        self.chunks.push_back(chunk);
    }

    fn pop(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.bytes -= chunk.len();
        Some(chunk)
    }
}

/// One client connection paired with at most one upstream connection.
pub struct RelaySession<C, K>
where
    K: UpstreamConnector,
{
    conn: ClientConnection,
    teardown: TeardownCoordinator<C, K::Stream>,
    connector: Arc<K>,
    config: RelayConfig,
    state: SessionState,
    history: Vec<SessionState>,
    pending: PendingFrames,
    connect_attempts: u32,
    bytes_up: u64,
    bytes_down: u64,
}

impl<C, K> RelaySession<C, K>
where
    C: AsyncRead + AsyncWrite + Unpin,
    K: UpstreamConnector,
{
    pub fn new(conn: ClientConnection, client: C, connector: Arc<K>, config: RelayConfig) -> Self {
        Self {
            conn,
            teardown: TeardownCoordinator::new(client),
            connector,
            config,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
            pending: PendingFrames::default(),
            connect_attempts: 0,
            bytes_up: 0,
            bytes_down: 0,
        }
    }

    /// Drive the session to completion.
    ///
    /// `initial` is the hand-off from the handshake layer. `Some` (even an
    /// empty chunk) counts as the first client event and starts the dial at
    /// once; `None` waits in IDLE for the first client read.
    pub async fn run(mut self, initial: Option<Bytes>) -> SessionSummary {
        let started = Instant::now();
        shadowlink_metrics::record_session_started();

        let reason = match self.drive(initial).await {
            Ok(never) => match never {},
            Err(e) => e,
        };
        self.teardown.close(&mut self.conn, &reason).await;
        self.transition(SessionState::Closed);

        let duration = started.elapsed();
        shadowlink_metrics::record_session_bytes(self.bytes_up, self.bytes_down);
        shadowlink_metrics::record_session_closed(reason.error_type(), duration.as_secs_f64());

        SessionSummary {
            id: self.conn.id(),
            states: self.history,
            reason,
            connect_attempts: self.connect_attempts,
            bytes_up: self.bytes_up,
            bytes_down: self.bytes_down,
            duration,
        }
    }

    async fn drive(&mut self, initial: Option<Bytes>) -> Result<Infallible, RelayError> {
        let first = match initial {
            Some(chunk) => chunk,
            None => self.read_first().await?,
        };
        // Nothing can be framed without a destination, so never dial for it.
        if self.conn.destination().is_none() {
            return Err(RelayError::MissingDestination);
        }
        self.transition(SessionState::Connecting);
        self.pending.push(first);

        let upstream = self.connect().await?;
        self.transition(SessionState::Relaying);

        self.teardown
            .attach_upstream(upstream.stream)
            .map_err(|_| io::Error::other("upstream already attached"))?;
        let client = self.teardown.client_mut().ok_or(RelayError::PeerClosed)?;
        send_success(client, upstream.bound).await?;

        self.flush_pending().await?;
        self.relay().await
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug!(conn = self.conn.id(), from = %self.state, to = %next, "session state");
        self.state = next;
        self.history.push(next);
    }

    async fn read_first(&mut self) -> Result<Bytes, RelayError> {
        let mut buf = vec![0u8; self.config.buffer_size];
        let client = self.teardown.client_mut().ok_or(RelayError::PeerClosed)?;
        let n = client.read(&mut buf).await?;
        if n == 0 {
            return Err(RelayError::PeerClosed);
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Dial the upstream while queueing any client bytes that arrive meanwhile.
    async fn connect(&mut self) -> Result<Upstream<K::Stream>, RelayError> {
        self.connect_attempts += 1;
        let started = Instant::now();
        let connector = Arc::clone(&self.connector);
        let dial = tokio::time::timeout(self.config.connect_timeout, K::connect(&connector));
        tokio::pin!(dial);

        let limit = self.config.max_pending_bytes;
        let mut buf = vec![0u8; self.config.buffer_size];
        let client = self.teardown.client_mut().ok_or(RelayError::PeerClosed)?;

        loop {
            tokio::select! {
                res = &mut dial => {
                    let err = match res {
                        Ok(Ok(upstream)) => {
                            shadowlink_metrics::record_upstream_connected(started.elapsed().as_secs_f64());
                            debug!(conn = self.conn.id(), bound = %upstream.bound, "upstream connected");
                            return Ok(upstream);
                        }
                        Ok(Err(e)) => e,
                        Err(_) => ClientError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "upstream connect timed out",
                        )),
                    };
                    shadowlink_metrics::record_upstream_connect_failure();
                    return Err(RelayError::UpstreamConnect(err));
                }
                res = client.read(&mut buf), if self.pending.bytes < limit => {
                    match res? {
                        0 => return Err(RelayError::PeerClosed),
                        n => self.pending.push(Bytes::copy_from_slice(&buf[..n])),
                    }
                }
            }
        }
    }

    /// Send everything queued during CONNECTING, one frame per chunk.
    async fn flush_pending(&mut self) -> Result<(), RelayError> {
        while let Some(chunk) = self.pending.pop() {
            if chunk.is_empty() {
                continue;
            }
            let frame = encode_frame(&mut self.conn, &chunk)?;
            let upstream = self.teardown.upstream_mut().ok_or(RelayError::PeerClosed)?;
            upstream.write_all(&frame).await?;
            self.bytes_up += chunk.len() as u64;
        }
        if let Some(upstream) = self.teardown.upstream_mut() {
            upstream.flush().await?;
        }
        Ok(())
    }

    /// Pump both directions until one side closes, errors or goes idle.
    async fn relay(&mut self) -> Result<Infallible, RelayError> {
        let idle_timeout = self.config.idle_timeout;
        let inbound = Direction::Inbound {
            decode: self.config.decode_inbound,
        };
        let mut out_buf = vec![0u8; self.config.buffer_size];
        let mut in_buf = vec![0u8; self.config.buffer_size];
        let mut out_state = PumpState::Reading;
        let mut in_state = PumpState::Reading;

        let conn = &mut self.conn;
        let bytes_up = &mut self.bytes_up;
        let bytes_down = &mut self.bytes_down;
        let (client, upstream) = self.teardown.streams_mut().ok_or(RelayError::PeerClosed)?;

        let idle_sleep = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle_sleep);

        loop {
            let both = poll_fn(|cx| {
                let mut ready = false;

                match poll_pump(
                    cx,
                    &mut *client,
                    &mut *upstream,
                    &mut out_buf,
                    &mut out_state,
                    conn,
                    Direction::Outbound,
                ) {
                    Poll::Ready(Ok(PumpPoll::Moved(n))) => {
                        *bytes_up += n as u64;
                        ready = true;
                    }
                    Poll::Ready(Ok(PumpPoll::Eof)) => return Poll::Ready(Err(RelayError::PeerClosed)),
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {}
                }

                // Counted as soon as they move, so an early return below loses nothing.
                match poll_pump(
                    cx,
                    &mut *upstream,
                    &mut *client,
                    &mut in_buf,
                    &mut in_state,
                    conn,
                    inbound,
                ) {
                    Poll::Ready(Ok(PumpPoll::Moved(n))) => {
                        *bytes_down += n as u64;
                        ready = true;
                    }
                    Poll::Ready(Ok(PumpPoll::Eof)) => return Poll::Ready(Err(RelayError::PeerClosed)),
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {}
                }

                if ready {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            });

            tokio::select! {
                result = both => {
                    result?;
                    idle_sleep.as_mut().reset(TokioInstant::now() + idle_timeout);
                }
                _ = &mut idle_sleep => {
                    return Err(RelayError::IdleTimeout);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use shadowlink_crypto::{CipherFactory, CipherKind};
    use shadowlink_proto::Address;
    use tokio::io::{DuplexStream, duplex};

    use super::*;

    const BOUND: &str = "10.0.0.2:3030";
    const REPLY: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 10, 0, 0, 2, 0x0B, 0xD6];

    struct MockConnector {
        attempts: AtomicU32,
        streams: Mutex<Vec<DuplexStream>>,
        delay: Duration,
        fail: bool,
    }

    impl MockConnector {
        fn serving(stream: DuplexStream) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                streams: Mutex::new(vec![stream]),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn refusing() -> Self {
            Self {
                attempts: AtomicU32::new(0),
                streams: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail: true,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl UpstreamConnector for MockConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<Upstream<DuplexStream>, ClientError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ClientError::Io(io::ErrorKind::ConnectionRefused.into()));
            }
            let stream = self
                .streams
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ClientError::Config("no stream left".into()))?;
            Ok(Upstream {
                stream,
                bound: BOUND.parse().unwrap(),
            })
        }
    }

    fn factory() -> CipherFactory {
        CipherFactory::from_password(CipherKind::Aes128Cfb, "123456")
    }

    fn config() -> RelayConfig {
        RelayConfig {
            idle_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            buffer_size: 4096,
            max_pending_bytes: 64 * 1024,
            decode_inbound: false,
        }
    }

    fn session(
        destination: Option<Address>,
        client: DuplexStream,
        connector: Arc<MockConnector>,
        config: RelayConfig,
    ) -> RelaySession<DuplexStream, MockConnector> {
        let conn = ClientConnection::new(
            1,
            "127.0.0.1:50000".parse().unwrap(),
            destination,
            factory().create().unwrap(),
        );
        RelaySession::new(conn, client, connector, config)
    }

    fn header_93_184_216_34_80() -> Vec<u8> {
        vec![0x01, 0x5D, 0xB8, 0xD8, 0x22, 0x00, 0x50]
    }

    /// Read `plain_len` decrypted bytes (plus the IV) from the remote side.
    async fn read_decoded(remote: &mut DuplexStream, plain_len: usize) -> Vec<u8> {
        let mut wire = vec![0u8; 16 + plain_len];
        remote.read_exact(&mut wire).await.unwrap();
        factory().create().unwrap().decode(&wire).to_vec()
    }

    #[tokio::test]
    async fn happy_path() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let session = session(
            Some("93.184.216.34:80".parse().unwrap()),
            client_side,
            connector.clone(),
            config(),
        );
        let task = tokio::spawn(session.run(None));

        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        app.write_all(request).await.unwrap();

        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, REPLY);

        let mut expected = header_93_184_216_34_80();
        expected.extend_from_slice(request);
        assert_eq!(read_decoded(&mut remote, expected.len()).await, expected);

        // Inbound bytes pass through untouched.
        remote.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        let mut response = [0u8; 19];
        app.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"HTTP/1.1 200 OK\r\n\r\n");

        drop(app);
        let summary = task.await.unwrap();
        assert!(matches!(summary.reason, RelayError::PeerClosed));
        assert_eq!(
            summary.states,
            vec![
                SessionState::Idle,
                SessionState::Connecting,
                SessionState::Relaying,
                SessionState::Closed
            ]
        );
        assert_eq!(summary.connect_attempts, 1);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(summary.bytes_up, request.len() as u64);
        assert_eq!(summary.bytes_down, 19);

        let mut buf = [0u8; 1];
        assert_eq!(remote.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bytes_during_connect_are_queued_behind_one_header() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector =
            Arc::new(MockConnector::serving(upstream_side).with_delay(Duration::from_millis(100)));
        let session = session(
            Some("93.184.216.34:80".parse().unwrap()),
            client_side,
            connector.clone(),
            config(),
        );
        let task = tokio::spawn(session.run(None));

        for part in [&b"one "[..], b"two ", b"three"] {
            app.write_all(part).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, REPLY);

        let mut expected = header_93_184_216_34_80();
        expected.extend_from_slice(b"one two three");
        let mut rx = factory().create().unwrap();
        let mut wire = vec![0u8; 16 + expected.len()];
        remote.read_exact(&mut wire).await.unwrap();
        assert_eq!(&rx.decode(&wire)[..], &expected[..]);

        // Later frames continue the keystream with no second header.
        app.write_all(b"!").await.unwrap();
        let mut tail = [0u8; 1];
        remote.read_exact(&mut tail).await.unwrap();
        assert_eq!(&rx.decode(&tail)[..], b"!");

        drop(app);
        let summary = task.await.unwrap();
        assert_eq!(summary.connect_attempts, 1);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(summary.bytes_up, 14);
    }

    #[tokio::test]
    async fn pending_cap_applies_back_pressure_without_loss() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector =
            Arc::new(MockConnector::serving(upstream_side).with_delay(Duration::from_millis(100)));
        let mut cfg = config();
        cfg.max_pending_bytes = 1;
        let session = session(
            Some(Address::new("example.com", 80)),
            client_side,
            connector,
            cfg,
        );
        let task = tokio::spawn(session.run(None));

        app.write_all(b"hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        app.write_all(b"world").await.unwrap();

        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();

        let mut expected = vec![0x03, 0x0B];
        expected.extend_from_slice(b"example.com");
        expected.extend_from_slice(&[0x00, 0x50]);
        expected.extend_from_slice(b"helloworld");
        assert_eq!(read_decoded(&mut remote, expected.len()).await, expected);

        drop(app);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure_sends_no_reply() {
        let (mut app, client_side) = duplex(4096);
        let connector = Arc::new(MockConnector::refusing());
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector.clone(),
            config(),
        );

        let summary = session.run(Some(Bytes::new())).await;
        assert!(matches!(summary.reason, RelayError::UpstreamConnect(_)));
        assert_eq!(
            summary.states,
            vec![
                SessionState::Idle,
                SessionState::Connecting,
                SessionState::Closed
            ]
        );
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

        let mut buf = Vec::new();
        app.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty(), "unexpected reply {buf:?}");
    }

    #[tokio::test]
    async fn connect_timeout_is_upstream_connect_error() {
        let (_app, client_side) = duplex(4096);
        let (_remote, upstream_side) = duplex(4096);
        let connector =
            Arc::new(MockConnector::serving(upstream_side).with_delay(Duration::from_secs(10)));
        let mut cfg = config();
        cfg.connect_timeout = Duration::from_millis(50);
        let session = session(Some("1.2.3.4:443".parse().unwrap()), client_side, connector, cfg);

        let summary = session.run(Some(Bytes::new())).await;
        match summary.reason {
            RelayError::UpstreamConnect(ClientError::Io(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::TimedOut)
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[tokio::test]
    async fn idle_timeout_closes_both_sides_once() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let mut cfg = config();
        cfg.idle_timeout = Duration::from_millis(100);
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector,
            cfg,
        );

        let start = TokioInstant::now();
        let summary = session.run(Some(Bytes::new())).await;
        assert!(matches!(summary.reason, RelayError::IdleTimeout));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(summary.states.last(), Some(&SessionState::Closed));
        assert_eq!(
            summary
                .states
                .iter()
                .filter(|s| **s == SessionState::Closed)
                .count(),
            1
        );

        let mut buf = Vec::new();
        app.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, REPLY);
        buf.clear();
        remote.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn empty_hand_off_defers_header_to_first_payload() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector,
            config(),
        );
        let task = tokio::spawn(session.run(Some(Bytes::new())));

        // The reply arrives before the application sends anything.
        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, REPLY);

        app.write_all(b"ping").await.unwrap();
        let decoded = read_decoded(&mut remote, 7 + 4).await;
        assert_eq!(&decoded[..7], &[0x01, 1, 2, 3, 4, 0x01, 0xBB]);
        assert_eq!(&decoded[7..], b"ping");

        drop(app);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_destination_closes_before_dialing() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let session = session(None, client_side, connector.clone(), config());

        let summary = session.run(Some(Bytes::from_static(b"payload"))).await;
        assert!(matches!(summary.reason, RelayError::MissingDestination));
        assert_eq!(summary.states, vec![SessionState::Idle, SessionState::Closed]);
        assert_eq!(summary.connect_attempts, 0);
        assert_eq!(summary.bytes_up, 0);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);

        // No success reply for a session that could never frame its payload.
        let mut buf = Vec::new();
        app.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty(), "unexpected reply {buf:?}");

        drop(connector);
        remote.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn failed_reply_still_closes_upstream() {
        let (app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        // A full queue keeps the connect phase from noticing the closed client.
        let mut cfg = config();
        cfg.max_pending_bytes = 1;
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector,
            cfg,
        );
        // The reply write fails because the application is gone.
        drop(app);

        let summary = session.run(Some(Bytes::from_static(b"x"))).await;
        assert!(matches!(summary.reason, RelayError::Transport(_)));
        assert_eq!(
            summary.states,
            vec![
                SessionState::Idle,
                SessionState::Connecting,
                SessionState::Relaying,
                SessionState::Closed
            ]
        );

        let mut buf = Vec::new();
        remote.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn bytes_moved_in_the_closing_poll_are_counted() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector,
            config(),
        );
        let task = tokio::spawn(session.run(Some(Bytes::new())));

        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();

        // Outbound data and upstream EOF become ready for the same poll.
        app.write_all(b"abc").await.unwrap();
        remote.shutdown().await.unwrap();

        let summary = task.await.unwrap();
        assert!(matches!(summary.reason, RelayError::PeerClosed));
        assert_eq!(summary.bytes_up, 3);

        let decoded = read_decoded(&mut remote, 7 + 3).await;
        assert_eq!(&decoded[7..], b"abc");
    }

    #[tokio::test]
    async fn decode_inbound_decrypts_upstream_bytes() {
        let (mut app, client_side) = duplex(4096);
        let (mut remote, upstream_side) = duplex(4096);
        let connector = Arc::new(MockConnector::serving(upstream_side));
        let mut cfg = config();
        cfg.decode_inbound = true;
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector,
            cfg,
        );
        let task = tokio::spawn(session.run(Some(Bytes::new())));

        let mut reply = [0u8; 10];
        app.read_exact(&mut reply).await.unwrap();

        let mut remote_cipher = factory().create().unwrap();
        remote.write_all(&remote_cipher.encode(b"secret")).await.unwrap();
        let mut plain = [0u8; 6];
        app.read_exact(&mut plain).await.unwrap();
        assert_eq!(&plain, b"secret");

        drop(remote);
        let summary = task.await.unwrap();
        assert!(matches!(summary.reason, RelayError::PeerClosed));
    }

    #[tokio::test]
    async fn client_close_while_idle() {
        let (app, client_side) = duplex(4096);
        let connector = Arc::new(MockConnector::refusing());
        let session = session(
            Some("1.2.3.4:443".parse().unwrap()),
            client_side,
            connector.clone(),
            config(),
        );
        drop(app);

        let summary = session.run(None).await;
        assert!(matches!(summary.reason, RelayError::PeerClosed));
        assert_eq!(summary.states, vec![SessionState::Idle, SessionState::Closed]);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
    }
}
