//! A single logged-in SIP2 connection.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{SipError, SipResult};
use crate::message::{self, TERMINATOR};

/// Upper bound on one response line.
const MAX_RESPONSE_LEN: usize = 4096;

/// One TCP session with the SIP2 server.
#[derive(Debug)]
pub struct SipConnection {
    stream: BufReader<TcpStream>,
    peer: String,
}

impl SipConnection {
    /// Dial `addr` and log in.
    pub async fn open(
        addr: &str,
        username: &str,
        password: &str,
        location: &str,
    ) -> SipResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true).ok();
        let mut conn = Self {
            stream: BufReader::new(stream),
            peer: addr.to_string(),
        };

        let reply = conn.call(&message::login(username, password, location)).await?;
        if !message::parse_login(&reply)? {
            return Err(SipError::LoginFailed);
        }
        debug!(peer = %conn.peer, "SIP login accepted");

        Ok(conn)
    }

    /// Send one request and wait for its response line.
    pub async fn call(&mut self, request: &str) -> SipResult<String> {
        let mut frame = Vec::with_capacity(request.len() + 1);
        frame.extend_from_slice(request.as_bytes());
        frame.push(TERMINATOR as u8);
        self.stream.get_mut().write_all(&frame).await?;
        debug!(peer = %self.peer, "-> {}", request);

        let mut buf = Vec::with_capacity(128);
        let n = (&mut self.stream)
            .take(MAX_RESPONSE_LEN as u64)
            .read_until(TERMINATOR as u8, &mut buf)
            .await?;
        if n == 0 {
            return Err(SipError::Closed);
        }
        if buf.last() != Some(&(TERMINATOR as u8)) {
            if buf.len() >= MAX_RESPONSE_LEN {
                return Err(SipError::Malformed("response too long".to_string()));
            }
            // EOF in the middle of a response
            return Err(SipError::Closed);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_matches(['\r', '\n']).to_string();
        debug!(peer = %self.peer, "<- {}", line);
        Ok(line)
    }
}
