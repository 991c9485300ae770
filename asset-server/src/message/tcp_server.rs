//! TCP 入口
//!
//! Lets an external layer (e.g. an HTTP API) append records to the pipeline's
//! channels. One frame per record, little-endian lengths:
//!
//! ```text
//! [u16 topic_len][topic][u16 key_len][key][u32 payload_len][payload]
//! ```
//!
//! The server answers every frame with one status byte ([`ACK_OK`] or
//! [`ACK_REJECTED`]). Only topics passed to [`IngressServer::new`] are
//! accepted.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::bus::Publisher;
use crate::utils::{AppError, AppResult};
use shared::Record;

pub const ACK_OK: u8 = 0;
pub const ACK_REJECTED: u8 = 1;

/// Upper bound on a single payload
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// One decoded ingress frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

pub struct IngressServer {
    publisher: Arc<dyn Publisher>,
    allowed_topics: Vec<String>,
    shutdown_token: CancellationToken,
}

impl IngressServer {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        allowed_topics: Vec<String>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            publisher,
            allowed_topics,
            shutdown_token,
        }
    }

    pub async fn bind(addr: &str) -> AppResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))
    }

    /// Main accept loop
    pub async fn serve(self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Ingress TCP server listening on {}", addr);
        }
        let server = Arc::new(self);

        loop {
            tokio::select! {
                _ = server.shutdown_token.cancelled() => {
                    tracing::info!("Ingress TCP server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Ingress client connected: {}", addr);
                            let server = server.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, addr).await {
                                    tracing::debug!("Ingress client {} handler finished: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, addr: SocketAddr) -> AppResult<()> {
        loop {
            let frame = tokio::select! {
                _ = self.shutdown_token.cancelled() => return Ok(()),
                frame = read_frame(&mut stream) => frame?,
            };
            let Some(frame) = frame else {
                tracing::debug!("Ingress client {} disconnected", addr);
                return Ok(());
            };

            let status = self.accept_frame(frame).await;
            stream.write_u8(status).await?;
        }
    }

    async fn accept_frame(&self, frame: Frame) -> u8 {
        if !self.allowed_topics.iter().any(|t| *t == frame.topic) {
            tracing::warn!(topic = %frame.topic, "Ingress frame rejected: topic not allowed");
            return ACK_REJECTED;
        }

        let record = Record::new(frame.key, frame.payload);
        match self.publisher.publish(&frame.topic, record).await {
            Ok(()) => ACK_OK,
            Err(e) => {
                tracing::error!(topic = %frame.topic, error = %e, "Ingress publish failed");
                ACK_REJECTED
            }
        }
    }
}

async fn read_string<R: AsyncReadExt + Unpin>(reader: &mut R, len: usize) -> AppResult<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| AppError::invalid(format!("Invalid UTF-8: {}", e)))
}

/// Read one frame; `Ok(None)` on a clean EOF before the first byte
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> AppResult<Option<Frame>> {
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let topic = read_string(reader, u16::from_le_bytes(len_buf) as usize).await?;

    reader.read_exact(&mut len_buf).await?;
    let key = read_string(reader, u16::from_le_bytes(len_buf) as usize).await?;

    let mut payload_len = [0u8; 4];
    reader.read_exact(&mut payload_len).await?;
    let payload_len = u32::from_le_bytes(payload_len) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(AppError::invalid(format!(
            "Payload too large: {} bytes",
            payload_len
        )));
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        topic,
        key,
        payload,
    }))
}

/// Write one frame (client side)
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    topic: &str,
    key: &str,
    payload: &[u8],
) -> AppResult<()> {
    let topic_len = u16::try_from(topic.len()).map_err(|_| AppError::invalid("Topic too long"))?;
    let key_len = u16::try_from(key.len()).map_err(|_| AppError::invalid("Key too long"))?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(AppError::invalid("Payload too large"));
    }

    let mut buf = Vec::with_capacity(8 + topic.len() + key.len() + payload.len());
    buf.extend_from_slice(&topic_len.to_le_bytes());
    buf.extend_from_slice(topic.as_bytes());
    buf.extend_from_slice(&key_len.to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBus;

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, "command-queue", "wallet-1", b"{}")
            .await
            .unwrap();
        drop(client);

        let frame = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(frame.topic, "command-queue");
        assert_eq!(frame.key, "wallet-1");
        assert_eq!(frame.payload, b"{}");
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut header = Vec::new();
        header.extend_from_slice(&1u16.to_le_bytes());
        header.extend_from_slice(b"t");
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&(MAX_PAYLOAD_LEN as u32 + 1).to_le_bytes());
        client.write_all(&header).await.unwrap();

        assert!(matches!(
            read_frame(&mut server).await,
            Err(AppError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_ingress_publishes_allowed_topics_only() {
        let bus = MessageBus::new();
        let token = CancellationToken::new();
        let listener = IngressServer::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = IngressServer::new(
            Arc::new(bus.clone()),
            vec!["command-queue".to_string()],
            token.clone(),
        );
        let task = tokio::spawn(server.serve(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, "command-queue", "wallet-9", b"{\"type\":\"deposit\"}")
            .await
            .unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), ACK_OK);

        write_frame(&mut stream, "event-dlq", "wallet-9", b"{}")
            .await
            .unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), ACK_REJECTED);

        let records = bus.records("command-queue");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "wallet-9");
        assert!(bus.records("event-dlq").is_empty());

        token.cancel();
        task.await.unwrap();
    }
}
