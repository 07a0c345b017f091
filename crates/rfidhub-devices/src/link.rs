//! TCP connection to a station's RFID reader.
//!
//! [`DeviceLink::connect`] dials the reader, performs the version handshake
//! and splits the socket into a [`TcpDeviceWriter`] (owned by the station
//! actor) and a [`DeviceReader`] that runs as its own task and forwards
//! every decoded frame as a [`DeviceEvent`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec::{
    CodecError, DeviceCodec, DeviceCommand, DeviceResponse, FRAME_TERMINATOR, MAX_FRAME_LEN,
};
use crate::error::DeviceError;

/// Event delivered from the reader task to the station.
#[derive(Debug)]
pub enum DeviceEvent {
    Response(DeviceResponse),
    /// The connection is gone or out of sync; no further events follow
    LinkFailed(DeviceError),
}

/// Outgoing half of a device connection.
#[async_trait]
pub trait DeviceWriter: Send {
    /// Encode and send one command.
    async fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError>;

    /// Reset the codec turn state at the start of a batch.
    fn reset(&mut self);
}

/// Connection factory.
pub struct DeviceLink;

impl DeviceLink {
    /// Connect to a reader and run the version handshake.
    ///
    /// `handshake_timeout` also bounds every later command write, so a reader
    /// that stops draining its socket fails the link instead of stalling the
    /// station.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Result<(TcpDeviceWriter, DeviceReader), DeviceError> {
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(DeviceError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => return Err(DeviceError::ConnectTimeout(addr.to_string())),
        };
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let mut writer = TcpDeviceWriter::new(write_half, addr, handshake_timeout);
        let mut reader = DeviceReader::new(read_half, addr);

        let handshake = async {
            writer.send(&DeviceCommand::Initialize).await?;
            reader.read_response().await
        };
        let response = tokio::time::timeout(handshake_timeout, handshake)
            .await
            .map_err(|_| DeviceError::HandshakeTimeout)??;
        if !response.ok {
            return Err(DeviceError::HandshakeRejected);
        }
        writer.reset();

        Ok((writer, reader))
    }
}

/// Writer over a TCP write half.
pub struct TcpDeviceWriter {
    writer: OwnedWriteHalf,
    codec: DeviceCodec,
    peer: String,
    write_timeout: Duration,
}

impl TcpDeviceWriter {
    fn new(writer: OwnedWriteHalf, peer: &str, write_timeout: Duration) -> Self {
        Self {
            writer,
            codec: DeviceCodec::new(),
            peer: peer.to_string(),
            write_timeout,
        }
    }
}

#[async_trait]
impl DeviceWriter for TcpDeviceWriter {
    async fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError> {
        let frame = self.codec.encode(command);
        tokio::time::timeout(self.write_timeout, self.writer.write_all(&frame))
            .await
            .map_err(|_| DeviceError::WriteTimeout(self.write_timeout.as_secs_f64()))??;
        debug!(
            peer = %self.peer,
            seq = self.codec.sequence(),
            "-> {:?}",
            String::from_utf8_lossy(&frame)
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.codec.reset();
    }
}

/// Reader over a TCP read half.
pub struct DeviceReader {
    reader: BufReader<OwnedReadHalf>,
    codec: DeviceCodec,
    peer: String,
}

impl DeviceReader {
    fn new(reader: OwnedReadHalf, peer: &str) -> Self {
        Self {
            reader: BufReader::new(reader),
            codec: DeviceCodec::new(),
            peer: peer.to_string(),
        }
    }

    /// Read and decode the next frame.
    pub async fn read_response(&mut self) -> Result<DeviceResponse, DeviceError> {
        let mut frame = Vec::with_capacity(64);
        let n = (&mut self.reader)
            .take(MAX_FRAME_LEN as u64)
            .read_until(FRAME_TERMINATOR, &mut frame)
            .await?;
        if n == 0 {
            return Err(DeviceError::Closed);
        }
        if frame.last() != Some(&FRAME_TERMINATOR) {
            if frame.len() >= MAX_FRAME_LEN {
                return Err(CodecError::TooLong.into());
            }
            // EOF in the middle of a frame
            return Err(DeviceError::Closed);
        }
        debug!(peer = %self.peer, "<- {:?}", String::from_utf8_lossy(&frame));

        Ok(self.codec.decode(&frame)?)
    }

    /// Forward frames to `events` until the link fails or the receiver is
    /// dropped.
    pub fn spawn(mut self, events: mpsc::UnboundedSender<DeviceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.read_response().await {
                    Ok(response) => {
                        if events.send(DeviceEvent::Response(response)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(peer = %self.peer, error = %e, "RFID reader link failed");
                        let _ = events.send(DeviceEvent::LinkFailed(e));
                        break;
                    }
                }
            }
        })
    }
}
