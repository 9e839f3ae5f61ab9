use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::traits::{Link, LinkEvent, TransportState};

const EVENT_CAPACITY: usize = 64;
const WRITE_QUEUE_CAPACITY: usize = 32;

type WriteRequest = (Bytes, oneshot::Sender<io::Result<()>>);

#[derive(Debug, Clone, Copy)]
struct Status {
    state: TransportState,
    connected_once: bool,
}

struct Shared {
    config: TransportConfig,
    status: watch::Sender<Status>,
    writer: Mutex<Option<mpsc::Sender<WriteRequest>>>,
    reconnect: Notify,
    shutdown: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: TransportState) {
        self.status.send_modify(|status| {
            // Closed is terminal.
            if status.state != TransportState::Closed {
                status.state = state;
                if state == TransportState::Connected {
                    status.connected_once = true;
                }
            }
        });
    }

    fn current_writer(&self) -> Option<mpsc::Sender<WriteRequest>> {
        self.writer.lock().clone()
    }

    fn set_writer(&self, writer: Option<mpsc::Sender<WriteRequest>>) {
        *self.writer.lock() = writer;
    }
}

enum SessionEnd {
    Shutdown,
    Forced,
    Eof,
    Failed(io::Error),
    ConsumerGone,
}

/// TCP link that reconnects forever until closed.
///
/// A dedicated task owns the socket. It forwards every read as
/// [`LinkEvent::Data`], performs queued writes in order, and on any failure
/// emits [`LinkEvent::SessionEnded`], waits the configured backoff and
/// connects again.
pub struct ReconnectingTransport {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectingTransport {
    /// Start the connection task. Must be called inside a tokio runtime.
    pub fn spawn(config: TransportConfig) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(Status {
            state: TransportState::Disconnected,
            connected_once: false,
        });
        let shared = Arc::new(Shared {
            config,
            status,
            writer: Mutex::new(None),
            reconnect: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let task = tokio::spawn(run(Arc::clone(&shared), events_tx));

        (
            Self {
                shared,
                task: Mutex::new(Some(task)),
            },
            events_rx,
        )
    }

    /// Wait until the first session is established.
    ///
    /// Fails with [`TransportError::Closed`] if the transport is closed first.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut status = self.shared.status.subscribe();
        let status = status
            .wait_for(|s| s.connected_once || s.state == TransportState::Closed)
            .await
            .map_err(|_| TransportError::Closed)?;
        if status.state == TransportState::Closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }
}

#[async_trait]
impl Link for ReconnectingTransport {
    async fn write(&self, data: Bytes) -> Result<()> {
        self.wait_connected().await?;

        match self.state() {
            TransportState::Closed => return Err(TransportError::Closed),
            TransportState::Connected => {}
            _ => return Err(TransportError::NotConnected),
        }

        let writer = self
            .shared
            .current_writer()
            .ok_or(TransportError::NotConnected)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        writer
            .send((data, ack_tx))
            .await
            .map_err(|_| TransportError::NotConnected)?;
        ack_rx
            .await
            .map_err(|_| TransportError::NotConnected)?
            .map_err(TransportError::Io)
    }

    fn reconnect(&self) {
        debug!(addr = %self.shared.config.addr(), "reconnect requested");
        self.shared.reconnect.notify_waiters();
    }

    async fn close(&self) {
        self.shared.shutdown.cancel();
        self.shared.set_state(TransportState::Closed);

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn state(&self) -> TransportState {
        self.shared.status.borrow().state
    }
}

impl Drop for ReconnectingTransport {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn run(shared: Arc<Shared>, events: mpsc::Sender<LinkEvent>) {
    let addr = shared.config.addr();

    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        shared.set_state(TransportState::Connecting);
        debug!(%addr, "connecting");

        let attempt = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            attempt = tokio::time::timeout(
                shared.config.connect_timeout,
                TcpStream::connect(&addr),
            ) => attempt,
        };

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                let err = TransportError::Connect {
                    addr: addr.clone(),
                    source,
                };
                debug!(%err, "connect failed");
                shared.set_state(TransportState::Disconnected);
                if !backoff(&shared).await {
                    break;
                }
                continue;
            }
            Err(_) => {
                debug!(%addr, "connect timed out");
                shared.set_state(TransportState::Disconnected);
                if !backoff(&shared).await {
                    break;
                }
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            debug!(%addr, %err, "failed to disable nagle");
        }
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        shared.set_writer(Some(write_tx));
        shared.set_state(TransportState::Connected);
        info!(%addr, "connected");

        let end = if events.send(LinkEvent::Connected).await.is_err() {
            SessionEnd::ConsumerGone
        } else {
            session(&shared, stream, write_rx, &events).await
        };

        shared.set_writer(None);
        shared.set_state(TransportState::Disconnected);

        match &end {
            SessionEnd::Shutdown => debug!(%addr, "session closed by shutdown"),
            SessionEnd::Forced => debug!(%addr, "session dropped for reconnect"),
            SessionEnd::Eof => debug!(%addr, "peer closed connection"),
            SessionEnd::Failed(err) => debug!(%addr, %err, "session failed"),
            SessionEnd::ConsumerGone => debug!(%addr, "event consumer dropped"),
        }

        // On shutdown the end of the event stream is the only notification.
        if matches!(end, SessionEnd::ConsumerGone | SessionEnd::Shutdown)
            || events.send(LinkEvent::SessionEnded).await.is_err()
            || !backoff(&shared).await
        {
            break;
        }
    }

    shared.set_writer(None);
    shared.set_state(TransportState::Closed);
    debug!(%addr, "transport task finished");
}

/// Sleep out the reconnect backoff. Returns false if shut down meanwhile.
async fn backoff(shared: &Shared) -> bool {
    tokio::select! {
        _ = shared.shutdown.cancelled() => false,
        _ = tokio::time::sleep(shared.config.reconnect_backoff) => true,
    }
}

async fn session(
    shared: &Shared,
    stream: TcpStream,
    mut write_rx: mpsc::Receiver<WriteRequest>,
    events: &mpsc::Sender<LinkEvent>,
) -> SessionEnd {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; shared.config.read_chunk_size.max(1)];

    let reconnect = shared.reconnect.notified();
    tokio::pin!(reconnect);
    reconnect.as_mut().enable();

    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => return SessionEnd::Shutdown,
            _ = &mut reconnect => return SessionEnd::Forced,
            read = reader.read(&mut buf) => match read {
                Ok(0) => return SessionEnd::Eof,
                Ok(n) => {
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if events.send(LinkEvent::Data(chunk)).await.is_err() {
                        return SessionEnd::ConsumerGone;
                    }
                }
                Err(err) => return SessionEnd::Failed(err),
            },
            Some((data, ack)) = write_rx.recv() => {
                match writer.write_all(&data).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(err) => {
                        let kind = err.kind();
                        let _ = ack.send(Err(err));
                        return SessionEnd::Failed(io::Error::from(kind));
                    }
                }
            }
        }
    }
}
