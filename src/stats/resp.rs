//! Statistics store backed by a remote key-value server speaking RESP
//! (the Redis serialization protocol).
//!
//! Only `GET` and `SET ... EX` are issued. Connections are opened on demand
//! and returned to a small idle pool after a clean round trip, so concurrent
//! requests never wait on each other's I/O. A connection that fails or times
//! out is dropped. Every round trip is bounded by a timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CacheError;

use super::store::StatsStore;

/// Default per-operation timeout.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(250);

/// Upper bound on a bulk reply, to avoid allocating on a corrupt length.
const MAX_BULK_LEN: usize = 16 * 1024 * 1024;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Nil,
}

/// Idle connections kept for reuse; extra ones are closed on release.
const MAX_IDLE_CONNECTIONS: usize = 8;

type Connection = BufStream<TcpStream>;

/// Remote store client.
pub struct RespStatsStore {
    address: String,
    timeout: Duration,
    idle: Mutex<Vec<Connection>>,
}

impl RespStatsStore {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            timeout: DEFAULT_CACHE_TIMEOUT,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn command(&self, args: &[&[u8]]) -> Result<Reply, CacheError> {
        // Checkout happens outside the timeout; only I/O is bounded
        let pooled = self.idle.lock().await.pop();

        match tokio::time::timeout(self.timeout, self.round_trip(pooled, args)).await {
            Ok(Ok((reply, stream))) => {
                self.release(stream).await;
                Ok(reply)
            }
            // A failed or timed-out connection may hold a partial reply and is dropped
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CacheError::Timeout),
        }
    }

    async fn round_trip(
        &self,
        pooled: Option<Connection>,
        args: &[&[u8]],
    ) -> Result<(Reply, Connection), CacheError> {
        let mut stream = match pooled {
            Some(stream) => stream,
            None => {
                debug!(address = %self.address, "Connecting to statistics store");
                let stream = TcpStream::connect(&self.address)
                    .await
                    .map_err(|e| CacheError::Unavailable(format!("{}: {}", self.address, e)))?;
                BufStream::new(stream)
            }
        };

        stream
            .write_all(&encode_command(args))
            .await
            .map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;

        let reply = read_reply(&mut stream).await?;
        Ok((reply, stream))
    }

    async fn release(&self, stream: Connection) {
        let mut idle = self.idle.lock().await;
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(stream);
        }
    }

    #[cfg(test)]
    async fn idle_connections(&self) -> usize {
        self.idle.lock().await.len()
    }
}

#[async_trait]
impl StatsStore for RespStatsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.command(&[b"GET", key.as_bytes()]).await? {
            Reply::Bulk(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| CacheError::Protocol(e.to_string())),
            Reply::Nil => Ok(None),
            other => Err(CacheError::Protocol(format!(
                "unexpected GET reply: {:?}",
                other
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // EX takes whole seconds and rejects zero
        let seconds = ttl.as_secs().max(1).to_string();
        let reply = self
            .command(&[
                b"SET",
                key.as_bytes(),
                value.as_bytes(),
                b"EX",
                seconds.as_bytes(),
            ])
            .await?;

        match reply {
            Reply::Simple(s) if s == "OK" => Ok(()),
            other => Err(CacheError::Protocol(format!(
                "unexpected SET reply: {:?}",
                other
            ))),
        }
    }

    fn backend(&self) -> &'static str {
        "resp"
    }
}

fn unavailable(err: std::io::Error) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

/// Encode a command as a RESP array of bulk strings.
fn encode_command(args: &[&[u8]]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
    buf
}

async fn read_line<S>(stream: &mut S) -> Result<String, CacheError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = stream.read_line(&mut line).await.map_err(unavailable)?;
    if n == 0 {
        return Err(CacheError::Unavailable(
            "connection closed by store".to_string(),
        ));
    }
    match line.strip_suffix("\r\n") {
        Some(stripped) => Ok(stripped.to_string()),
        None => Err(CacheError::Protocol(format!("unterminated line: {:?}", line))),
    }
}

async fn read_reply<S>(stream: &mut S) -> Result<Reply, CacheError>
where
    S: AsyncBufRead + Unpin,
{
    let line = read_line(stream).await?;
    let Some(kind) = line.chars().next() else {
        return Err(CacheError::Protocol("empty reply".to_string()));
    };
    let rest = &line[kind.len_utf8()..];

    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Err(CacheError::Protocol(format!("store error: {}", rest))),
        ':' => rest
            .parse()
            .map(Reply::Integer)
            .map_err(|_| CacheError::Protocol(format!("bad integer: {}", rest))),
        '$' => {
            let len: i64 = rest
                .parse()
                .map_err(|_| CacheError::Protocol(format!("bad bulk length: {}", rest)))?;
            if len < 0 {
                return Ok(Reply::Nil);
            }
            let len = len as usize;
            if len > MAX_BULK_LEN {
                return Err(CacheError::Protocol(format!("bulk reply too large: {}", len)));
            }
            let mut payload = vec![0u8; len + 2];
            stream.read_exact(&mut payload).await.map_err(unavailable)?;
            if !payload.ends_with(b"\r\n") {
                return Err(CacheError::Protocol("unterminated bulk reply".to_string()));
            }
            payload.truncate(len);
            Ok(Reply::Bulk(payload))
        }
        _ => Err(CacheError::Protocol(format!("unsupported reply: {:?}", line))),
    }
}

// =============================================================================
// Tests
// =============================================================================
