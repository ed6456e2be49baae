//! # Transport
//!
//! The narrow seam between the link logic and the wire, plus its TCP
//! implementation.
//!
//! ## TCP Transport
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TcpTransport                                    │
//! │                                                                         │
//! │  send(command)                                                          │
//! │     │  encode_frame                                                     │
//! │     ▼                                                                   │
//! │  OwnedWriteHalf ─────────────────────────────────────► controller       │
//! │                                                                         │
//! │  reader task (spawned per connection)                                  │
//! │  OwnedReadHalf ◄──────────────────────────────────────── controller     │
//! │     │  FrameDecoder → Reply::parse                                      │
//! │     ├── OK / NG / CE / DP / bad frame ──► replies ──► send() returns   │
//! │     ├── EVnnnn ─────────────────────────► events  ──► try_receive_event │
//! │     └── unknown ────────────────────────► debug log                     │
//! │                                                                         │
//! │  EOF or read error: reader ends, pending send() sees Disconnected      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use ptl_core::ModuleAddress;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LinkError, LinkResult};
use crate::frame::{encode_frame, FrameDecoder, Reply};

/// Button events buffered before new ones are dropped.
const EVENT_QUEUE_CAPACITY: usize = 64;

// =============================================================================
// Seams
// =============================================================================

/// A button press reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub address: ModuleAddress,
}

/// One open connection to the controller.
#[async_trait]
pub trait Transport: Send {
    /// Sends one command body and waits for the controller's reply.
    async fn send(&mut self, command: &str) -> LinkResult<()>;

    /// Next queued button event, without waiting.
    ///
    /// Fails with [`LinkError::Disconnected`] once the connection is gone and
    /// the queue is drained.
    fn try_receive_event(&mut self) -> LinkResult<Option<ButtonEvent>>;

    /// Closes the connection.
    async fn close(&mut self) -> LinkResult<()>;
}

/// Opens connections to the controller.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> LinkResult<Box<dyn Transport>>;

    /// Where this connector points, for logs.
    fn describe(&self) -> String;
}

// =============================================================================
// TCP Connector
// =============================================================================

/// Connects to the controller over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpConnector {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> LinkResult<Box<dyn Transport>> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| LinkError::ConnectionFailed(format!("{}: {}", self.describe(), e)))?;
        // Commands are small and latency matters more than throughput
        stream.set_nodelay(true)?;

        info!(controller = %self.describe(), "Connected to controller");
        Ok(Box::new(TcpTransport::from_stream(stream)))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// TCP Transport
// =============================================================================

/// A connected TCP link with its background frame reader.
pub struct TcpTransport {
    writer: OwnedWriteHalf,
    replies: mpsc::UnboundedReceiver<LinkResult<()>>,
    events: mpsc::Receiver<ButtonEvent>,
    reader: JoinHandle<()>,
}

impl TcpTransport {
    /// Splits the stream and spawns the reader task.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read_half, writer) = stream.into_split();
        let (reply_tx, replies) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let reader = tokio::spawn(read_loop(read_half, reply_tx, event_tx));

        TcpTransport {
            writer,
            replies,
            events,
            reader,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, command: &str) -> LinkResult<()> {
        // A reply that arrived after its sender gave up must not answer
        // this command
        while let Ok(stale) = self.replies.try_recv() {
            debug!(?stale, "Discarding late controller reply");
        }

        let frame = encode_frame(command)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;

        match self.replies.recv().await {
            Some(reply) => reply,
            None => Err(LinkError::Disconnected),
        }
    }

    fn try_receive_event(&mut self) -> LinkResult<Option<ButtonEvent>> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            // Reader task ended: the controller closed the socket
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    async fn close(&mut self) -> LinkResult<()> {
        self.reader.abort();
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    replies: mpsc::UnboundedSender<LinkResult<()>>,
    events: mpsc::Sender<ButtonEvent>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) => {
                info!("Controller closed the connection");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Controller read failed");
                return;
            }
        };

        decoder.extend(&buf[..n]);
        while let Some(frame) = decoder.next_frame() {
            let reply = match frame {
                Ok(body) => Reply::parse(&body),
                Err(e) => {
                    warn!(error = %e, "Malformed frame from controller");
                    // Answers the pending command, if any
                    let _ = replies.send(Err(e));
                    continue;
                }
            };

            match reply {
                Reply::Button(address) => {
                    debug!(%address, "Button pressed");
                    if events.try_send(ButtonEvent { address }).is_err() {
                        warn!(%address, "Button event queue full, event dropped");
                    }
                }
                Reply::Unknown(body) => {
                    debug!(body = %body.escape_debug(), "Ignoring unknown controller message");
                }
                other => {
                    if let Some(ack) = other.into_ack() {
                        let _ = replies.send(ack);
                    }
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
