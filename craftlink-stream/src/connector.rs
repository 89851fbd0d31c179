//! Opening sockets and turning them into record streams
//!
//! [`Connector`] is the seam between the retry worker and the network. The
//! retry worker only sees a [`RecordStream`]; dropping that stream closes the
//! socket behind it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use craftlink_protocol::{DecodeError, JsonLineDecoder, Record, RecordDecoder};

use crate::config::StreamConfig;
use crate::endpoint::Endpoint;
use crate::error::{Result, StreamError};

/// Decoded records read from one open socket.
///
/// Ends cleanly when the server closes the socket. The first error is the
/// last item.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Opens a connection to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `endpoint` and return its record stream
    async fn connect(&self, endpoint: &Endpoint) -> Result<RecordStream>;
}

/// Connector for the newline-delimited TCP socket of the server plugin
pub struct TcpConnector {
    decoder: Arc<dyn RecordDecoder>,
    connect_timeout: Duration,
    max_frame_len: usize,
}

impl TcpConnector {
    /// Create a connector decoding JSON lines
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_decoder(Arc::new(JsonLineDecoder::new(config.max_frame_len)), config)
    }

    /// Create a connector with a custom frame decoder
    pub fn with_decoder(decoder: Arc<dyn RecordDecoder>, config: &StreamConfig) -> Self {
        Self {
            decoder,
            connect_timeout: config.connect_timeout,
            max_frame_len: config.max_frame_len,
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(&StreamConfig::default())
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<RecordStream> {
        let socket = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| StreamError::ConnectTimeout(endpoint.clone()))?
        .map_err(|source| StreamError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

        debug!(endpoint = %endpoint, "Socket open");

        let state = LineReader {
            reader: BufReader::new(socket),
            buf: Vec::new(),
            max_frame_len: self.max_frame_len,
            decoder: Arc::clone(&self.decoder),
            endpoint: endpoint.clone(),
            failed: false,
        };

        Ok(stream::unfold(state, LineReader::next_record).boxed())
    }
}

/// Read loop state carried through [`stream::unfold`]
struct LineReader {
    reader: BufReader<TcpStream>,
    buf: Vec<u8>,
    max_frame_len: usize,
    decoder: Arc<dyn RecordDecoder>,
    endpoint: Endpoint,
    failed: bool,
}

impl LineReader {
    async fn next_record(mut self) -> Option<(Result<Record>, Self)> {
        if self.failed {
            return None;
        }

        loop {
            let line = match self.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(endpoint = %self.endpoint, "Socket closed by server");
                    return None;
                }
                Err(error) => {
                    self.failed = true;
                    return Some((Err(error), self));
                }
            };

            // blank lines are keep-alives
            if line.trim().is_empty() {
                continue;
            }

            let record = self
                .decoder
                .decode(&line)
                .map_err(|source| StreamError::Decode {
                    endpoint: self.endpoint.clone(),
                    source,
                });
            self.failed = record.is_err();
            return Some((record, self));
        }
    }

    /// Read one newline-terminated frame, buffering at most `max_frame_len`
    /// bytes of it
    async fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();

        let limit = self.max_frame_len as u64 + 1;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await;

        match read {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(source) => return Err(self.io_error(source)),
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if self.buf.len() > self.max_frame_len {
            return Err(StreamError::Decode {
                endpoint: self.endpoint.clone(),
                source: DecodeError::FrameTooLarge {
                    len: self.buf.len(),
                    max: self.max_frame_len,
                },
            });
        }

        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => Ok(Some(line)),
            Err(e) => Err(self.io_error(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StreamError {
        StreamError::Io {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn serve(lines: &'static [&'static str]) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            for line in lines {
                socket.write_all(line.as_bytes()).await.unwrap();
                socket.write_all(b"\n").await.unwrap();
            }
            socket.shutdown().await.unwrap();
        });

        Endpoint::new("127.0.0.1", port)
    }

    #[tokio::test]
    async fn test_reads_records_until_clean_close() {
        let endpoint = serve(&[
            r#"{"type":"players","data":[]}"#,
            "",
            r#"{"type":"signs","data":[]}"#,
        ])
        .await;

        let records: Vec<_> = TcpConnector::default()
            .connect(&endpoint)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Ok(Record::Players(_))));
        assert!(matches!(records[1], Ok(Record::Signs(_))));
    }

    #[tokio::test]
    async fn test_decode_error_ends_stream() {
        let endpoint = serve(&[
            "garbage",
            r#"{"type":"players","data":[]}"#,
        ])
        .await;

        let records: Vec<_> = TcpConnector::default()
            .connect(&endpoint)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Err(StreamError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_unterminated_frame_hits_size_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // no newline, and the socket stays open
            socket.write_all(&vec![b'a'; 4 * 1024 * 1024]).await.ok();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = StreamConfig::default().with_max_frame_len(1024);
        let mut records = TcpConnector::new(&config)
            .connect(&Endpoint::new("127.0.0.1", port))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), records.next())
            .await
            .expect("the size limit must end the read");
        match first {
            Some(Err(StreamError::Decode {
                source: DecodeError::FrameTooLarge { len, max },
                ..
            })) => {
                assert_eq!(max, 1024);
                assert!(len > max);
            }
            other => panic!("Expected FrameTooLarge, got {:?}", other),
        }
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpConnector::default()
            .connect(&Endpoint::new("127.0.0.1", port))
            .await;

        match result {
            Err(error) => assert!(error.is_connection_error(), "got {:?}", error),
            Ok(_) => panic!("connect to a closed port must fail"),
        }
    }
}
