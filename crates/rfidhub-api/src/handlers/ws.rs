//! Station WebSocket.
//!
//! Every UI connection becomes one station. The socket task decodes inbound
//! frames into the station inbox, writes the station's outbound messages and
//! keeps the connection alive with pings; the station itself runs as its own
//! task (see [`rfidhub_station::run_station`]).

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::{Sink, SinkExt, StreamExt};
use rfidhub_core::Message;
use rfidhub_station::{run_station, StationContext};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ServerState;

/// Transport-level frame limit. Frames above the configured UI limit but
/// below this one are dropped without closing the connection.
const TRANSPORT_MAX_FRAME: usize = 64 * 1024;

/// WebSocket handler for a station UI.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<ServerState>,
) -> Response {
    let ip = addr.ip().to_canonical().to_string();
    let max = TRANSPORT_MAX_FRAME.max(state.config.ui.max_message_size);
    ws.max_message_size(max)
        .on_upgrade(move |socket| handle_station_socket(socket, ip, state))
}

async fn handle_station_socket(socket: WebSocket, ip: String, state: ServerState) {
    let registration = state.hub.register(&ip);
    let conn_id = registration.conn_id;

    let (inbox_tx, inbox) = mpsc::unbounded_channel();
    let (ui_tx, mut outbound) = mpsc::unbounded_channel();
    let ctx = StationContext {
        ip: ip.clone(),
        device: state.config.device.clone(),
        station: state.config.station.clone(),
        circulation: state.circulation.clone(),
    };
    let station = tokio::spawn(run_station(ctx, inbox, ui_tx, registration.stop));

    let ui = &state.config.ui;
    let max_message_size = ui.max_message_size;
    let write_timeout = ui.write_timeout();
    let pong_wait = ui.pong_wait();
    let ping_interval = ui.ping_interval();

    let (mut sink, mut stream) = socket.split();
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    let read_deadline = tokio::time::sleep(pong_wait);
    tokio::pin!(read_deadline);

    loop {
        tokio::select! {
            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        debug!(station = %ip, error = %e, "UI socket read failed");
                        break;
                    }
                    None => break,
                };
                read_deadline.as_mut().reset(Instant::now() + pong_wait);

                let data = match frame {
                    WsMessage::Text(text) => text.into_bytes(),
                    WsMessage::Binary(data) => data,
                    WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                    WsMessage::Close(_) => break,
                };
                if let Some(msg) = decode_frame(&ip, &data, max_message_size) {
                    if inbox_tx.send(msg).is_err() {
                        break;
                    }
                }
            }
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(station = %ip, error = %e, "Failed to encode UI message");
                            continue;
                        }
                    };
                    if let Err(e) = send_with_timeout(&mut sink, WsMessage::Text(json), write_timeout).await {
                        debug!(station = %ip, error = %e, "UI socket write failed");
                        break;
                    }
                }
                None => {
                    // Station finished; close the UI side too
                    let _ = send_with_timeout(&mut sink, WsMessage::Close(None), write_timeout).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if let Err(e) = send_with_timeout(&mut sink, WsMessage::Ping(Vec::new()), write_timeout).await {
                    debug!(station = %ip, error = %e, "UI ping failed");
                    break;
                }
            }
            _ = &mut read_deadline => {
                warn!(station = %ip, timeout = ?pong_wait, "UI silent for too long, closing");
                break;
            }
        }
    }

    // Closing the inbox stops the station if it is still running
    drop(inbox_tx);
    match station.await {
        Ok(reason) => info!(station = %ip, ?reason, "UI connection closed"),
        Err(e) => warn!(station = %ip, error = %e, "Station task failed"),
    }
    state.hub.unregister(&ip, conn_id);
}

/// Decode one inbound frame; oversize and undecodable frames are dropped.
pub fn decode_frame(ip: &str, data: &[u8], max_message_size: usize) -> Option<Message> {
    if data.len() > max_message_size {
        warn!(station = %ip, len = data.len(), max = max_message_size, "UI frame too large, dropped");
        return None;
    }
    match serde_json::from_slice::<Message>(data) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!(station = %ip, error = %e, "Undecodable UI frame, dropped");
            None
        }
    }
}

async fn send_with_timeout<S>(
    sink: &mut S,
    frame: WsMessage,
    timeout: Duration,
) -> Result<(), String>
where
    S: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    match tokio::time::timeout(timeout, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("write timed out after {:?}", timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfidhub_core::Action;

    #[test]
    fn test_decode_valid_frame() {
        let msg = decode_frame("ip", br#"{"action":"CHECKIN","branch":"hutl"}"#, 512).unwrap();
        assert_eq!(msg.action, Action::Checkin);
        assert_eq!(msg.branch.as_deref(), Some("hutl"));
    }

    #[test]
    fn test_decode_drops_oversize_frame() {
        let frame = format!(r#"{{"action":"CHECKIN","branch":"{}"}}"#, "x".repeat(600));
        assert!(decode_frame("ip", frame.as_bytes(), 512).is_none());
        assert!(decode_frame("ip", frame.as_bytes(), 1024).is_some());
    }

    #[test]
    fn test_decode_drops_bad_json() {
        assert!(decode_frame("ip", b"not json", 512).is_none());
        assert!(decode_frame("ip", br#"{"action":"DANCE"}"#, 512).is_none());
    }
}
