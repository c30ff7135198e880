use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::commands::{Command, ProtocolError};
use crate::dispatch::Message;
use crate::frame::{self, Frame};
use crate::Error;

/// Identifies a connection for its whole life, even after it is renamed.
pub type ClientId = Uuid;

/// Sent to the peer right before the server closes its connection.
pub const CLOSING_MESSAGE: &str = "SERVER CLOSING CONNECTION...";
/// Sent to the peer when the transport could not be shut down cleanly.
pub const CLOSE_FAILED_MESSAGE: &str = "SERVER CONNECTION CLOSE REQUEST FAILED.";

/// Splits an accepted socket in its two halves. The [`Connection`] is handed to the dispatch
/// loop, which is the only one writing replies. The [`ConnectionReader`] stays with the
/// connection task and forwards every decoded command.
pub fn split(
    stream: TcpStream,
    client_address: SocketAddr,
    codec: FrameCodec,
    messages: mpsc::Sender<Message>,
    removals: mpsc::Sender<ClientId>,
) -> (Connection, ConnectionReader) {
    let id = Uuid::new_v4();
    let (reader, writer) = stream.into_split();
    let shutdown = CancellationToken::new();

    let connection = Connection::new(id, client_address, writer, codec, shutdown.clone());
    let reader = ConnectionReader {
        id,
        client_address,
        reader,
        // Allocate the buffer with 4kb of capacity.
        buffer: BytesMut::with_capacity(4096),
        codec,
        messages,
        removals,
        shutdown,
    };

    (connection, reader)
}

/// The write side of a client connection, together with its display name.
#[derive(Debug)]
pub struct Connection {
    id: ClientId,
    name: String,
    client_address: SocketAddr,
    writer: OwnedWriteHalf,
    codec: FrameCodec,
    // Cancelling it stops the matching `ConnectionReader`.
    shutdown: CancellationToken,
}

impl Connection {
    pub(crate) fn new(
        id: ClientId,
        client_address: SocketAddr,
        writer: OwnedWriteHalf,
        codec: FrameCodec,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            name: id.to_string(),
            client_address,
            writer,
            codec,
            shutdown,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Defaults to the string form of the id until `CLIENT SETNAME` changes it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn client_address(&self) -> SocketAddr {
        self.client_address
    }

    /// Writes raw bytes to the socket and returns how many were written.
    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.writer.write_all(bytes).await?;
        Ok(bytes.len())
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        let mut buf = BytesMut::new();
        Encoder::<&Frame>::encode(&mut self.codec, frame, &mut buf)?;
        self.send(&buf).await?;
        Ok(())
    }

    /// Notifies the peer, shuts the transport down and stops the reading task. Every step is
    /// best effort: a broken connection cannot reliably receive either notice.
    pub async fn close(&mut self) {
        let notice = Frame::Simple(CLOSING_MESSAGE.to_string());
        if let Err(err) = self.write_frame(&notice).await {
            debug!(client_id = %self.id, "failed to send closing notice: {}", err);
        }

        if let Err(err) = self.writer.shutdown().await {
            debug!(client_id = %self.id, "failed to shut down connection: {}", err);

            let notice = Frame::Simple(CLOSE_FAILED_MESSAGE.to_string());
            if let Err(err) = self.write_frame(&notice).await {
                debug!(client_id = %self.id, "failed to send close failure notice: {}", err);
            }
        }

        self.shutdown.cancel();
    }
}

/// The read side of a client connection.
pub struct ConnectionReader {
    id: ClientId,
    client_address: SocketAddr,
    reader: OwnedReadHalf,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    codec: FrameCodec,
    messages: mpsc::Sender<Message>,
    removals: mpsc::Sender<ClientId>,
    shutdown: CancellationToken,
}

impl ConnectionReader {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the connection cleanly.
    ///
    /// Malformed input is returned as a protocol error after discarding everything buffered, the
    /// byte stream cannot be resynchronized otherwise. Only [`frame::Error::Io`] is fatal.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, frame::Error> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(err) => {
                    self.buffer.clear();
                    return Err(err);
                }
            }

            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                // The peer hung up in the middle of a frame.
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )
                .into());
            }
        }
    }

    /// Decodes frames until the peer hangs up or the server closes the connection. Every frame is
    /// handed to the dispatch loop, waiting until it has room for it, so commands of a single
    /// connection are processed in order.
    #[instrument(
        name = "connection",
        skip(self),
        fields(client_id, client_address)
    )]
    pub async fn read_loop(mut self) {
        tracing::Span::current()
            .record("client_id", self.id.to_string())
            .record("client_address", self.client_address.to_string());

        let shutdown = self.shutdown.clone();

        loop {
            let read = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("connection closed by the server");
                    return;
                }
                read = self.read_frame() => read,
            };

            let command = match read {
                Ok(Some(frame)) => {
                    debug!("received frame from client: {}", frame);
                    Command::try_from(frame)
                }
                Ok(None) => {
                    info!("connection closed by the client");
                    break;
                }
                Err(frame::Error::Io(err)) => {
                    warn!("failed to read from the connection: {}", err);
                    break;
                }
                Err(err) => Err(ProtocolError::from(err)),
            };

            let message = Message {
                client_id: self.id,
                command,
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("connection closed by the server");
                    return;
                }
                sent = self.messages.send(message) => {
                    if sent.is_err() {
                        warn!("dispatch loop is gone, dropping connection");
                        return;
                    }
                }
            }
        }

        if self.removals.send(self.id).await.is_err() {
            warn!("dispatch loop is gone, cannot signal connection removal");
        }
    }
}
