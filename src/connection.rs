//! Client facade and background reader task

use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    action::{ActionBuilder, AmiAction},
    constants::{DEFAULT_TIMEOUT_MS, SOCKET_BUF_SIZE},
    dispatch::{DispatchQueue, Dispatcher, EventCategory, Notification, SubscriptionId},
    error::{AmiError, AmiResult},
    framing::FrameReader,
    packet::{decode, Packet},
    session::{classify, PacketKind, SessionConfig, SessionState},
};

/// Why the background reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Server sent `Response: Goodbye`
    ServerGoodbye,
    /// Clean EOF on the TCP connection
    ConnectionClosed,
    /// TCP I/O error (io::Error is not Clone, so we store the message)
    IoError(String),
    /// Inbound data could not be framed
    ProtocolError(String),
    /// Client called close()
    ClientRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ServerGoodbye => write!(f, "server said goodbye"),
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
        }
    }
}

/// Options for AMI connection configuration.
///
/// Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    /// Limit on name resolution plus TCP connect. Default: 2 seconds.
    pub connect_timeout: Duration,
    /// Bytes requested per socket read. Default: 64KB.
    pub read_buffer_size: usize,
    /// Largest packet accepted before the session is dropped. Default: no
    /// limit.
    pub max_packet_size: Option<usize>,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_buffer_size: SOCKET_BUF_SIZE,
            max_packet_size: None,
        }
    }
}

/// Resolve `host` and connect to its first address.
async fn open_stream(host: &str, port: u16) -> AmiResult<TcpStream> {
    let addr = lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| AmiError::Resolve {
            host: host.to_string(),
        })?;
    debug!("[CONNECT] Resolved {} to {}", host, addr);
    Ok(TcpStream::connect(addr).await?)
}

async fn open_stream_with_timeout(host: &str, port: u16, limit: Duration) -> AmiResult<TcpStream> {
    match timeout(limit, open_stream(host, port)).await {
        Ok(result) => result,
        Err(_) => Err(AmiError::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Mark the session closed. Posts a Logoff if it was still logged in, so
/// subscribers see the session end even without a server Goodbye.
fn close_session(state: &watch::Sender<SessionState>, queue: &DispatchQueue) -> bool {
    let mut was_logged_in = false;
    let changed = state.send_if_modified(|s| {
        was_logged_in = s.is_logged_in();
        s.on_closed()
    });
    if was_logged_in {
        debug!("Session dropped while logged in, posting Logoff");
        queue.post(Notification::Logoff);
    }
    changed
}

/// Background reader loop
async fn reader_loop(
    frames: FrameReader<OwnedReadHalf>,
    state: Arc<watch::Sender<SessionState>>,
    queue: DispatchQueue,
) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(frames, &state, &queue));
    let reason = match futures_util::FutureExt::catch_unwind(result).await {
        Ok(reason) => reason,
        Err(_) => {
            tracing::error!("reader task panicked");
            DisconnectReason::IoError("reader task panicked".to_string())
        }
    };
    close_session(&state, &queue);
    info!("Reader stopped: {}", reason);
    queue.post(Notification::Disconnected(reason));
}

async fn reader_loop_inner(
    mut frames: FrameReader<OwnedReadHalf>,
    state: &watch::Sender<SessionState>,
    queue: &DispatchQueue,
) -> DisconnectReason {
    loop {
        let raw = match frames
            .next_packet()
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("Connection closed (EOF)");
                return DisconnectReason::ConnectionClosed;
            }
            Err(AmiError::Io(e)) => {
                warn!("Read error: {}", e);
                return DisconnectReason::IoError(e.to_string());
            }
            Err(e) => {
                warn!("Framing error: {}", e);
                return DisconnectReason::ProtocolError(e.to_string());
            }
        };

        let packet = decode(&raw);
        if packet.is_empty() {
            trace!("[RECV] Dropping packet with no headers");
            continue;
        }

        let kind = classify(&packet);
        let mut lifecycle = None;
        state.send_if_modified(|s| {
            let before = *s;
            lifecycle = s.apply(kind);
            *s != before
        });

        if let Some(lifecycle) = lifecycle {
            debug!("[RECV] {:?}, session now {}", lifecycle, *state.borrow());
            queue.post(lifecycle.into());
        }
        if !queue.post(Notification::Event(packet)) {
            debug!("Dispatch queue closed, reader exiting");
            return DisconnectReason::ClientRequested;
        }

        if kind == PacketKind::Goodbye {
            return DisconnectReason::ServerGoodbye;
        }
    }
}

/// Asterisk Manager Interface client.
///
/// Owns the session state, the transport and the subscriber set. Packets
/// are read by a background task, which queues notifications; handlers run
/// only when the owner drives [`dispatch_pending`](Self::dispatch_pending),
/// [`dispatch_next`](Self::dispatch_next) or
/// [`run_until_disconnected`](Self::run_until_disconnected). They therefore
/// never run concurrently with each other or with the owner's own code.
///
/// Failures surface as `bool` returns and notifications, not errors.
/// [`login`](Self::login) does not wait for the server's verdict.
pub struct AmiClient {
    config: SessionConfig,
    options: AmiConnectOptions,
    state: Arc<watch::Sender<SessionState>>,
    writer: Option<OwnedWriteHalf>,
    pending_reader: Option<FrameReader<OwnedReadHalf>>,
    reader_task: Option<JoinHandle<()>>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl AmiClient {
    /// Create a client. Nothing is sent until [`connect`](Self::connect).
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self::with_options(
            SessionConfig::new(username, secret, host, port),
            AmiConnectOptions::default(),
        )
    }

    /// Create a client with custom options.
    pub fn with_options(config: SessionConfig, options: AmiConnectOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            options,
            state: Arc::new(state),
            writer: None,
            pending_reader: None,
            reader_task: None,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Current target and credentials.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace target and credentials. Ignored while logged in; returns
    /// whether the new values were taken.
    pub fn reset(
        &mut self,
        username: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> bool {
        if self.is_logged_in() {
            debug!("Ignoring reset while logged in");
            return false;
        }
        self.config = SessionConfig::new(username, secret, host, port);
        true
    }

    /// Resolve the host and open the TCP connection.
    ///
    /// Returns `true` if already connected. On failure the client stays
    /// disconnected. A transport that ended, by Goodbye or a failed write,
    /// is replaced.
    pub async fn connect(&mut self) -> bool {
        self.release_stale_writer()
            .await;
        if self.is_connected() && self.writer.is_some() {
            trace!("[CONNECT] Already connected");
            return true;
        }

        info!(
            "[CONNECT] Connecting to {}:{}",
            self.config.host, self.config.port
        );
        let stream = match open_stream_with_timeout(
            &self.config.host,
            self.config.port,
            self.options.connect_timeout,
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[CONNECT] Failed: {}", e);
                return false;
            }
        };

        let (read_half, write_half) = stream.into_split();
        if let Some(stale) = self
            .reader_task
            .take()
        {
            stale.abort();
        }
        self.writer = Some(write_half);
        self.pending_reader = Some(FrameReader::with_limits(
            read_half,
            self.options.read_buffer_size,
            self.options.max_packet_size,
        ));
        self.state
            .send_if_modified(SessionState::on_connected);
        debug!("[CONNECT] TCP connection established");
        true
    }

    /// Send a Login action and start the background reader.
    ///
    /// Returns `false` if the transport is not open or the credentials
    /// contain line breaks. The outcome arrives later as a
    /// [`Notification::LoginSuccess`] or [`Notification::LoginFailed`].
    pub async fn login(&mut self, username: &str, secret: &str) -> bool {
        if !self.is_connected() {
            warn!("[LOGIN] Not connected");
            return false;
        }

        let action = AmiAction::Login {
            username: username.to_string(),
            secret: secret.to_string(),
        };
        let wire = match action.to_wire_format() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("[LOGIN] Refusing to send login: {}", e);
                return false;
            }
        };

        // Must precede the write: a running reader may apply the reply
        // first. A failed write closes the session below.
        self.state
            .send_if_modified(SessionState::on_login_sent);
        debug!("[LOGIN] Sending login for {} [REDACTED]", username);
        if let Err(e) = self
            .write_raw(&wire)
            .await
        {
            warn!("[LOGIN] Send failed: {}", e);
            return false;
        }

        self.ensure_reader();
        true
    }

    /// [`login`](Self::login) with the credentials given at construction or
    /// by the last [`reset`](Self::reset).
    pub async fn login_with_stored_credentials(&mut self) -> bool {
        let SessionConfig {
            username, secret, ..
        } = self
            .config
            .clone();
        self.login(&username, &secret)
            .await
    }

    /// Send a Logoff action and mark the session logged out immediately.
    ///
    /// No-op unless connected and logged in. The server's Goodbye arrives
    /// later as a [`Notification::Logoff`].
    pub async fn logoff(&mut self) {
        if !self.is_connected() || !self.is_logged_in() {
            debug!("Logoff ignored: not logged in");
            return;
        }

        let wire = match AmiAction::Logoff.to_wire_format() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Logoff encoding failed: {}", e);
                return;
            }
        };
        match self
            .write_raw(&wire)
            .await
        {
            Ok(()) => {
                self.state
                    .send_if_modified(SessionState::on_logoff_sent);
                info!("Logged off");
            }
            Err(e) => warn!("Logoff send failed: {}", e),
        }
    }

    /// Send an arbitrary action without waiting for its response.
    pub async fn send_action(&mut self, action: ActionBuilder) -> AmiResult<()> {
        if !self.is_connected() {
            return Err(AmiError::NotConnected);
        }
        let wire = action.build()?;
        debug!("Sending action: {}", wire.lines().next().unwrap_or(""));
        self.write_raw(&wire)
            .await
    }

    /// Write one encoded action. A failed write means the transport is
    /// dead, so it is dropped and the session closed.
    async fn write_raw(&mut self, wire: &str) -> AmiResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(AmiError::NotConnected)?;
        let result = writer
            .write_all(wire.as_bytes())
            .await;
        if let Err(e) = result {
            self.drop_transport(&e);
            return Err(AmiError::Io(e));
        }
        Ok(())
    }

    /// Forget the current transport after a write error.
    fn drop_transport(&mut self, error: &std::io::Error) {
        warn!("Write failed, dropping transport: {}", error);
        self.writer = None;
        self.pending_reader = None;
        if let Some(task) = self
            .reader_task
            .take()
        {
            task.abort();
        }
        let queue = self
            .dispatcher
            .queue();
        if close_session(&self.state, &queue) {
            queue.post(Notification::Disconnected(DisconnectReason::IoError(
                error.to_string(),
            )));
        }
    }

    /// Shut down the write half once the session has ended on its own,
    /// e.g. after a server Goodbye.
    async fn release_stale_writer(&mut self) {
        if self.is_connected() {
            return;
        }
        if let Some(mut writer) = self
            .writer
            .take()
        {
            debug!("Session ended, shutting down write half");
            if let Err(e) = writer
                .shutdown()
                .await
            {
                debug!("Shutdown of write half failed: {}", e);
            }
        }
    }

    /// Spawn the reader for the current transport if it has not been
    /// started yet.
    fn ensure_reader(&mut self) {
        if let Some(frames) = self
            .pending_reader
            .take()
        {
            debug!("Starting background reader");
            self.reader_task = Some(tokio::spawn(reader_loop(
                frames,
                self.state
                    .clone(),
                self.dispatcher
                    .queue(),
            )));
        }
    }

    fn reader_running(&self) -> bool {
        self.reader_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether the server has accepted the login and no logoff happened since.
    pub fn is_logged_in(&self) -> bool {
        self.state()
            .is_logged_in()
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.state()
            .is_open()
    }

    /// Current session state snapshot.
    pub fn state(&self) -> SessionState {
        *self
            .state
            .borrow()
    }

    /// Register a handler for one category. Handlers of a category run in
    /// registration order.
    pub fn subscribe(
        &mut self,
        category: EventCategory,
        handler: impl FnMut(&Notification) + Send + 'static,
    ) -> SubscriptionId {
        self.dispatcher
            .subscribe(category, handler)
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher
            .unsubscribe(id)
    }

    /// Handler for every non-empty packet.
    pub fn on_event(
        &mut self,
        mut handler: impl FnMut(&Packet) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventCategory::Event, move |n| {
            if let Notification::Event(packet) = n {
                handler(packet);
            }
        })
    }

    /// Handler for an accepted login.
    pub fn on_login_success(&mut self, mut handler: impl FnMut() + Send + 'static) -> SubscriptionId {
        self.subscribe(EventCategory::LoginSuccess, move |_| handler())
    }

    /// Handler for a rejected login.
    pub fn on_login_failed(&mut self, mut handler: impl FnMut() + Send + 'static) -> SubscriptionId {
        self.subscribe(EventCategory::LoginFailed, move |_| handler())
    }

    /// Handler for the end of a logged-in session.
    pub fn on_logoff(&mut self, mut handler: impl FnMut() + Send + 'static) -> SubscriptionId {
        self.subscribe(EventCategory::Logoff, move |_| handler())
    }

    /// Handler for the reader stopping.
    pub fn on_disconnect(
        &mut self,
        mut handler: impl FnMut(&DisconnectReason) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventCategory::Disconnect, move |n| {
            if let Notification::Disconnected(reason) = n {
                handler(reason);
            }
        })
    }

    /// Run handlers for everything queued so far, without waiting. Returns
    /// the number of notifications delivered.
    pub fn dispatch_pending(&mut self) -> usize {
        self.dispatcher
            .dispatch_pending()
    }

    /// Wait for the next notification and run its handlers.
    pub async fn dispatch_next(&mut self) -> Option<EventCategory> {
        let category = self
            .dispatcher
            .dispatch_next()
            .await;
        if category == Some(EventCategory::Disconnect) {
            self.release_stale_writer()
                .await;
        }
        category
    }

    /// Deliver notifications until the reader reports a disconnect.
    ///
    /// Returns at once, after draining the queue, if no reader is running.
    pub async fn run_until_disconnected(&mut self) {
        loop {
            if !self.reader_running() {
                self.dispatcher
                    .dispatch_pending();
                self.release_stale_writer()
                    .await;
                return;
            }
            match self
                .dispatch_next()
                .await
            {
                Some(EventCategory::Disconnect) | None => return,
                Some(_) => {}
            }
        }
    }

    /// Shut the transport down and stop the reader.
    ///
    /// Half-closes the write side, drops the transport, then aborts and
    /// awaits the reader task. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self
            .writer
            .take()
        {
            info!("Client requested disconnect");
            if let Err(e) = writer
                .shutdown()
                .await
            {
                debug!("Shutdown of write half failed: {}", e);
            }
        }
        self.pending_reader = None;

        if let Some(task) = self
            .reader_task
            .take()
        {
            task.abort();
            let _ = task.await;
        }

        let queue = self
            .dispatcher
            .queue();
        if close_session(&self.state, &queue) {
            queue.post(Notification::Disconnected(DisconnectReason::ClientRequested));
        }
    }
}

impl Drop for AmiClient {
    fn drop(&mut self) {
        // Dropping the write half shuts down the send direction.
        self.writer = None;
        if let Some(task) = self
            .reader_task
            .take()
        {
            task.abort();
        }
    }
}
