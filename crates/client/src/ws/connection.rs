//! Push-channel transport: connection state, backoff, and the Socket.IO
//! connection loop built on tokio-tungstenite.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use memehustle_shared::{decode_packet, Packet, CONNECT_FRAME, DEFAULT_LIVENESS, PONG_FRAME};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::channel::Shared;

/// Connection state for the push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failed attempts (0 = infinite)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(64) as i32);
        self.initial_delay.mul_f32(factor).min(self.max_delay)
    }
}

enum Session {
    /// `disconnect()` was called or the channel was dropped.
    Shutdown,
    /// The server closed the socket, the read failed or the heartbeat stopped.
    Lost,
}

/// Connect, join the Socket.IO namespace, pump events into the channel's
/// handlers, and reconnect with backoff until `shutdown` fires or the attempt
/// budget runs out.
pub(super) async fn run_connection_loop(
    url: Url,
    reconnect: ReconnectConfig,
    shared: Arc<Shared>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt = 0u32;

    loop {
        if attempt == 0 {
            shared.set_state(ConnectionState::Connecting);
        } else {
            shared.set_state(ConnectionState::Reconnecting { attempt });
        }

        let connected = tokio::select! {
            _ = &mut shutdown => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((ws_stream, _response)) => {
                crate::log_debug!(%url, "push transport open");
                let (mut write, mut read) = ws_stream.split();
                // Any frame counts as a sign of life; the server pings on a
                // schedule announced in its open packet.
                let mut liveness = DEFAULT_LIVENESS;

                let session = loop {
                    tokio::select! {
                        _ = &mut shutdown => {
                            let _ = write.send(Message::Close(None)).await;
                            break Session::Shutdown;
                        }
                        _ = tokio::time::sleep(liveness) => {
                            crate::log_warn!(%url, silent_ms = liveness.as_millis() as u64, "push channel heartbeat lost");
                            break Session::Lost;
                        }
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match decode_packet(&text) {
                                    Ok(Packet::Open(handshake)) => {
                                        liveness = handshake.liveness();
                                        Some(CONNECT_FRAME)
                                    }
                                    Ok(Packet::Ping) => Some(PONG_FRAME),
                                    Ok(Packet::Connect) => {
                                        shared.mark_connected();
                                        crate::log_info!(%url, "push channel connected");
                                        None
                                    }
                                    Ok(Packet::Event { name, payload }) => {
                                        shared.handle_event(&name, payload);
                                        None
                                    }
                                    Ok(Packet::Close | Packet::Disconnect) => {
                                        crate::log_info!(%url, "push channel closed by server");
                                        break Session::Lost;
                                    }
                                    Ok(Packet::ConnectError(reason)) => {
                                        crate::log_error!(%url, %reason, "push channel join refused");
                                        break Session::Lost;
                                    }
                                    Ok(Packet::Pong | Packet::Noop | Packet::Ignored) => None,
                                    Err(e) => {
                                        crate::log_debug!(error = %e, "dropping malformed push frame");
                                        None
                                    }
                                };
                                if let Some(reply) = reply {
                                    if let Err(e) = write.send(Message::text(reply)).await {
                                        crate::log_error!(%url, error = %e, "push channel write error");
                                        break Session::Lost;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                crate::log_info!(%url, "push channel closed by server");
                                break Session::Lost;
                            }
                            Some(Ok(_)) => {
                                // Binary, ping and pong frames carry no events.
                            }
                            Some(Err(e)) => {
                                crate::log_error!(%url, error = %e, "push channel read error");
                                break Session::Lost;
                            }
                        }
                    }
                };

                shared.set_state(ConnectionState::Disconnected);
                if let Session::Shutdown = session {
                    break;
                }
                attempt = 1;
            }
            Err(e) => {
                crate::log_error!(%url, error = %e, "push channel connect failed");

                if reconnect.max_attempts > 0 && attempt >= reconnect.max_attempts {
                    shared.set_state(ConnectionState::Failed {
                        reason: format!(
                            "Max reconnect attempts ({}) exceeded",
                            reconnect.max_attempts
                        ),
                    });
                    return;
                }
                attempt += 1;
            }
        }

        let delay = reconnect.delay_for_attempt(attempt.saturating_sub(1));
        crate::log_info!(%url, delay_ms = delay.as_millis() as u64, attempt, "reconnecting push channel");
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1500));
        assert_eq!(config.delay_for_attempt(20), Duration::from_millis(30000));
    }

    #[test]
    fn connecting_states() {
        assert!(ConnectionState::Reconnecting { attempt: 2 }.is_connecting());
        assert!(!ConnectionState::Connected.is_connecting());
        assert!(ConnectionState::Connected.is_connected());
    }
}
