//! Line-delimited message channel.
//!
//! A [`Channel`] carries one self-contained JSON message per line. It can be
//! backed by the process's own stdio (server side), a spawned child process
//! (host side), or any pair of async byte streams (tests use
//! `tokio::io::duplex`).

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Maximum size of a single line (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Configuration for launching a server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

type BoxedReader = Box<dyn AsyncBufRead + Send + Sync + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// Bidirectional line channel.
pub struct Channel {
    reader: ChannelReader,
    writer: ChannelWriter,
}

impl Channel {
    /// Build a channel from a reader and a writer.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: tokio::io::AsyncRead + Send + Sync + Unpin + 'static,
        W: AsyncWrite + Send + Sync + Unpin + 'static,
    {
        Self {
            reader: ChannelReader::new(Box::new(BufReader::new(reader))),
            writer: ChannelWriter::new(Box::new(writer)),
        }
    }

    /// Channel over this process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Spawn a server process and connect to its stdin/stdout.
    ///
    /// The child is killed when the writer half is dropped.
    pub fn spawn(config: &ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let mut channel = Self::new(stdout, stdin);
        channel.writer.child = Some(process);
        Ok(channel)
    }

    /// Read the next line. `Ok(None)` means the peer closed the stream.
    pub async fn receive(&mut self) -> Result<Option<String>> {
        self.reader.receive().await
    }

    /// Write one line.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.writer.send(line).await
    }

    /// Close the sending side.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    /// Split into independently owned halves.
    pub fn split(self) -> (ChannelReader, ChannelWriter) {
        (self.reader, self.writer)
    }
}

/// Receiving half of a [`Channel`].
pub struct ChannelReader {
    inner: BoxedReader,
    buf: Vec<u8>,
}

impl ChannelReader {
    fn new(inner: BoxedReader) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Oversized lines and lines that are not UTF-8 are consumed whole and
    /// reported as [`Error::OutputTooLarge`] or [`Error::InvalidUtf8`], so the
    /// caller can keep reading (see [`Error::is_line_error`]).
    pub async fn receive(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let bytes_read = self.inner.read_until(b'\n', &mut self.buf).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let mut line = self.buf.as_slice();
        while let [rest @ .., b'\n' | b'\r'] = line {
            line = rest;
        }

        if line.len() > MAX_LINE_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_LINE_SIZE,
            });
        }

        let line = std::str::from_utf8(line).map_err(Error::InvalidUtf8)?;
        Ok(Some(line.to_string()))
    }
}

/// Sending half of a [`Channel`].
pub struct ChannelWriter {
    inner: BoxedWriter,
    closed: bool,
    child: Option<Child>,
}

impl ChannelWriter {
    fn new(inner: BoxedWriter) -> Self {
        Self {
            inner,
            closed: false,
            child: None,
        }
    }

    /// Write `line` followed by a newline and flush.
    ///
    /// Lines the peer would refuse as oversized are rejected before any byte
    /// is written.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if line.len() > MAX_LINE_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_LINE_SIZE,
            });
        }
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut the stream down. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.shutdown().await?;
        if let Some(child) = self.child.as_mut() {
            // Best effort; the process is killed on drop regardless.
            let _ = child.start_kill();
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn pair() -> (Channel, Channel) {
        let (a, b) = duplex(4096);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (Channel::new(a_read, a_write), Channel::new(b_read, b_write))
    }

    #[tokio::test]
    async fn lines_round_trip_in_order() {
        let (mut left, mut right) = pair();
        left.send(r#"{"a":1}"#).await.unwrap();
        left.send(r#"{"b":2}"#).await.unwrap();

        assert_eq!(right.receive().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(right.receive().await.unwrap().as_deref(), Some(r#"{"b":2}"#));
    }

    #[tokio::test]
    async fn close_signals_eof_and_blocks_further_sends() {
        let (mut left, mut right) = pair();
        left.close().await.unwrap();
        left.close().await.unwrap();

        assert!(right.receive().await.unwrap().is_none());
        assert!(matches!(left.send("x").await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn bad_lines_are_consumed_and_reading_continues() {
        let (mut raw, b) = duplex(4 * MAX_LINE_SIZE);
        let (b_read, b_write) = tokio::io::split(b);
        let (mut reader, _writer) = Channel::new(b_read, b_write).split();

        let writer = tokio::spawn(async move {
            let mut big = vec![b'x'; MAX_LINE_SIZE + 1];
            big.push(b'\n');
            raw.write_all(&big).await.unwrap();
            raw.write_all(b"{\"a\":\"\xff\"}\n").await.unwrap();
            raw.write_all(b"ok\r\n").await.unwrap();
            raw
        });

        assert!(matches!(
            reader.receive().await,
            Err(Error::OutputTooLarge { size, .. }) if size == MAX_LINE_SIZE + 1
        ));
        let err = reader.receive().await.unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8(_)));
        assert!(err.is_line_error());
        assert_eq!(reader.receive().await.unwrap().as_deref(), Some("ok"));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let (mut left, right) = pair();
        let (mut reader, _writer) = right.split();

        let line = "y".repeat(MAX_LINE_SIZE);
        let expected = line.clone();
        let send = tokio::spawn(async move {
            left.send(&line).await.unwrap();
            left
        });

        assert_eq!(reader.receive().await.unwrap(), Some(expected));
        send.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_send_writes_nothing() {
        let (mut left, mut right) = pair();
        let big = "x".repeat(MAX_LINE_SIZE + 1);

        assert!(matches!(
            left.send(&big).await,
            Err(Error::OutputTooLarge { .. })
        ));
        left.send("next").await.unwrap();
        assert_eq!(right.receive().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn spawned_process_is_a_channel() {
        let config = ServerConfig {
            name: "cat".to_string(),
            command: "cat".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        };
        let mut channel = Channel::spawn(&config).unwrap();

        channel.send(r#"{"echo":true}"#).await.unwrap();
        assert_eq!(
            channel.receive().await.unwrap().as_deref(),
            Some(r#"{"echo":true}"#)
        );

        channel.close().await.unwrap();
        assert!(channel.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn spawn_reports_missing_command() {
        let config = ServerConfig {
            name: "missing".to_string(),
            command: "/nonexistent/toolhost-server".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        };
        assert!(matches!(Channel::spawn(&config), Err(Error::Spawn(_))));
    }
}
