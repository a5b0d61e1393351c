//! Minimal expect engine: buffer the output of an interactive transport and
//! wait, with a deadline, for a regular expression to show up in it.

use std::io;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

/// Output kept while waiting for a match.  Older output is discarded.
const MAX_BUFFER: usize = 64 * 1024;

#[derive(Debug)]
pub enum ExpectError {
    Timeout,
    Eof,
    Io(io::Error),
}

/// A successful match: the capture groups of the pattern, group 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub groups: Vec<Option<String>>,
}

impl Match {
    pub fn group(&self, i: usize) -> Option<&str> {
        self.groups.get(i).and_then(|g| g.as_deref())
    }
}

pub struct Expect<T> {
    io: T,
    buffer: String,
}

impl<T> Expect<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            buffer: String::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Forget everything read so far.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.io.write_all(line.as_bytes()).await?;
        self.io.write_all(b"\n").await?;
        self.io.flush().await
    }

    /// Read until `pattern` matches the buffered output or `wait` elapses.
    /// Output up to the end of the match is consumed.
    pub async fn expect(&mut self, pattern: &Regex, wait: Duration) -> Result<Match, ExpectError> {
        let deadline = Instant::now() + wait;
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(found) = self.take_match(pattern) {
                return Ok(found);
            }
            match timeout_at(deadline, self.io.read(&mut chunk)).await {
                Err(_) => return Err(ExpectError::Timeout),
                Ok(Ok(0)) => return Err(ExpectError::Eof),
                Ok(Ok(n)) => self.push(&chunk[..n]),
                Ok(Err(e)) => return Err(ExpectError::Io(e)),
            }
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        if self.buffer.len() > MAX_BUFFER {
            let mut cut = self.buffer.len() - MAX_BUFFER;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
    }

    fn take_match(&mut self, pattern: &Regex) -> Option<Match> {
        let captures = pattern.captures(&self.buffer)?;
        let end = captures.get(0).map_or(0, |m| m.end());
        let groups = captures
            .iter()
            .map(|g| g.map(|g| g.as_str().to_string()))
            .collect();
        self.buffer.drain(..end);
        Some(Match { groups })
    }
}
