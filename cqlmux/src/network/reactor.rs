//! Socket I/O boundary of the transport core.
//!
//! A [`Reactor`] opens byte transports; everything above it only sees a
//! [`Transport`] to write to and a stream of [`TransportEvent`]s.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

use crate::errors::TransportError;

const READ_BUFFER_SIZE: usize = 8192;

/// What a transport reports to its owner.
#[derive(Debug)]
pub enum TransportEvent {
    /// Bytes read from the socket, in order.
    Data(Bytes),
    /// The transport is closed. `None` for a close requested with [`Transport::close`].
    Closed(Option<TransportError>),
}

/// Writing side of an open connection.
pub trait Transport: Send + Sync + Debug {
    /// Queues `data` for writing. Never blocks; data written after close is dropped.
    fn write(&self, data: Bytes);

    /// Closes the connection cleanly. The event stream ends with `Closed(None)`.
    fn close(&self);
}

/// An open transport together with the events it produces.
#[derive(Debug)]
pub struct TransportHandle {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens transports to nodes.
#[async_trait]
pub trait Reactor: Send + Sync + Debug {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TransportHandle, TransportError>;
}

/// [`Reactor`] over tokio TCP sockets.
#[derive(Debug, Clone)]
pub struct TokioReactor {
    tcp_nodelay: bool,
    tcp_keepalive_interval: Option<Duration>,
}

impl Default for TokioReactor {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            tcp_keepalive_interval: None,
        }
    }
}

impl TokioReactor {
    pub fn new(tcp_nodelay: bool, tcp_keepalive_interval: Option<Duration>) -> Self {
        Self {
            tcp_nodelay,
            tcp_keepalive_interval,
        }
    }

    fn setup_tcp_keepalive(
        stream: &TcpStream,
        tcp_keepalive_interval: Duration,
    ) -> std::io::Result<()> {
        // Our interval is the idle time before keepalives begin to be sent,
        // which socket2 calls "time".
        let mut tcp_keepalive = TcpKeepalive::new().with_time(tcp_keepalive_interval);

        #[cfg(any(
            target_os = "android",
            target_os = "freebsd",
            target_os = "linux",
            target_os = "macos",
            target_os = "windows",
        ))]
        {
            tcp_keepalive = tcp_keepalive.with_interval(Duration::from_secs(1));
        }

        let sf = SockRef::from(&stream);
        sf.set_tcp_keepalive(&tcp_keepalive)
    }
}

#[async_trait]
impl Reactor for TokioReactor {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TransportHandle, TransportError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    host: host.to_owned(),
                    port,
                    timeout,
                });
            }
        };
        stream.set_nodelay(self.tcp_nodelay)?;

        if let Some(tcp_keepalive_interval) = self.tcp_keepalive_interval {
            Self::setup_tcp_keepalive(&stream, tcp_keepalive_interval)?;
        }

        let (write_sender, write_receiver) = mpsc::unbounded_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let close_signal = Arc::new(Notify::new());

        tokio::spawn(run_socket(
            stream,
            write_receiver,
            event_sender,
            close_signal.clone(),
        ));

        Ok(TransportHandle {
            transport: Arc::new(TokioTransport {
                writes: write_sender,
                close_signal,
            }),
            events: event_receiver,
        })
    }
}

#[derive(Debug)]
struct TokioTransport {
    writes: mpsc::UnboundedSender<Bytes>,
    close_signal: Arc<Notify>,
}

impl Transport for TokioTransport {
    fn write(&self, data: Bytes) {
        // The socket task is gone only after it reported Closed.
        let _ = self.writes.send(data);
    }

    fn close(&self) {
        self.close_signal.notify_one();
    }
}

/// Why a socket loop stopped; `None` for a clean stop.
type StopCause = Option<TransportError>;

async fn run_socket(
    stream: TcpStream,
    writes: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<TransportEvent>,
    close_signal: Arc<Notify>,
) {
    let (read_half, write_half) = stream.into_split();

    let r = read_loop(read_half, &events);
    let w = write_loop(write_half, writes);
    let c = async {
        close_signal.notified().await;
        Err::<(), StopCause>(None)
    };

    // Every loop only returns when it stops, so the join ends at the first one.
    let cause = match futures::try_join!(r, w, c) {
        Ok(_) => None,
        Err(cause) => cause,
    };
    let _ = events.send(TransportEvent::Closed(cause));
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Result<(), StopCause> {
    let mut read_buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    loop {
        read_buf.reserve(READ_BUFFER_SIZE);
        match read_half.read_buf(&mut read_buf).await {
            Ok(0) => {
                return Err(Some(TransportError::from(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                ))));
            }
            Ok(_) => {
                let data = read_buf.split().freeze();
                if events.send(TransportEvent::Data(data)).is_err() {
                    // Nobody listens anymore.
                    return Err(None);
                }
            }
            Err(err) => return Err(Some(err.into())),
        }
    }
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut writes: mpsc::UnboundedReceiver<Bytes>,
) -> Result<(), StopCause> {
    let mut write_buf = BytesMut::new();
    while let Some(data) = writes.recv().await {
        write_buf.extend_from_slice(&data);
        // Coalesce everything queued in the meantime into a single write.
        while let Ok(more) = writes.try_recv() {
            write_buf.extend_from_slice(&more);
        }
        trace!(bytes = write_buf.len(), "Sending");
        write_half
            .write_all(&write_buf)
            .await
            .map_err(|err| Some(TransportError::from(err)))?;
        write_buf.clear();
    }
    // The transport was dropped. Dropping the write half sends FIN.
    Err(None)
}
