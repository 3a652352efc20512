use std::io::{Read, Write};
use crate::error::StreamError;

pub trait ReadWrite: Read + Write {}
impl<T: Read + Write> ReadWrite for T {}

/// Wraps a readable/writeable connection and provides the line and
/// byte reads needed to take an HTTP/1.1 response apart.
pub struct Stream<'a> {
    head_max: usize,
    buffer: Vec<u8>,
    stream_buffer: Vec<u8>,
    stream: Box<dyn ReadWrite + 'a>,
    connected: bool,
}

impl<'a> Stream<'a> {
    /// `head_max` bounds how much may be buffered while looking for a line end.
    /// Body reads are not bounded by it.
    pub fn new(stream: impl ReadWrite + 'a, head_max: usize) -> Stream<'a> {
        Stream {
            head_max,
            buffer: vec![],
            stream_buffer: vec![0; 8192],
            connected: true,
            stream: Box::new(stream),
        }
    }

    /// Scans for newlines (linefeed) in the buffer.
    fn buffer_has_newline(&self, offset: usize) -> Option<usize> {
        self.buffer[offset.min(self.buffer.len())..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|i| i + offset)
    }

    /// Takes the line ending at `newline` out of the buffer, dropping an optional CR.
    fn take_line(&mut self, newline: usize) -> String {
        let end = if newline > 0 && self.buffer[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };
        let line = String::from_utf8_lossy(&self.buffer[0..end]).into_owned();
        self.buffer.drain(0..=newline);
        line
    }

    /// Reads once from the wrapped stream into the buffer.
    /// Any error marks the stream as no longer connected.
    fn fill_buffer(&mut self) -> Result<(), StreamError> {
        if !self.connected {
            return Err(StreamError::StreamNotConnected);
        }
        match self.stream.read(&mut self.stream_buffer) {
            Ok(0) => {
                // closed "nicely"
                self.connected = false;
                Err(StreamError::ConnectionClosed)
            }
            Ok(c) => {
                self.buffer.extend_from_slice(&self.stream_buffer[0..c]);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(()),
            Err(e) => {
                self.connected = false;
                Err(e.into())
            }
        }
    }

    /// Reads until the next newline is detected in the stream,
    /// and returns the bytes read as an UTF-8 string.
    pub fn next_line(&mut self) -> Result<String, StreamError> {
        let mut index = 0;
        loop {
            if let Some(end) = self.buffer_has_newline(index) {
                return Ok(self.take_line(end));
            }
            // no need to rescan what we already looked at
            index = self.buffer.len();
            if self.buffer.len() > self.head_max {
                self.connected = false;
                return Err(StreamError::BufferOverflow);
            }
            if !self.connected {
                return Err(StreamError::StreamNotConnected);
            }
            self.fill_buffer()?;
        }
    }

    /// Attempts to read a fixed amount of bytes from the wrapped stream.
    pub fn next_bytes(&mut self, count: usize) -> Result<Vec<u8>, StreamError> {
        if !self.connected && self.buffer.len() < count {
            return Err(StreamError::StreamNotConnected);
        }
        while self.buffer.len() < count {
            self.fill_buffer()?;
        }
        Ok(self.buffer.drain(0..count).collect())
    }

    /// Reads everything until the peer closes the connection.
    pub fn read_to_close(&mut self) -> Result<Vec<u8>, StreamError> {
        loop {
            match self.fill_buffer() {
                Ok(()) => continue,
                Err(StreamError::ConnectionClosed) | Err(StreamError::StreamNotConnected) => {
                    return Ok(std::mem::take(&mut self.buffer));
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Buffered bytes are handed out before the wrapped stream is read again,
/// so decoders can pick up right after the response head.
impl Read for Stream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.buffer.is_empty() {
            if !self.connected {
                return Ok(0);
            }
            return match self.stream.read(buf) {
                Err(e) if e.kind() != std::io::ErrorKind::Interrupted => {
                    self.connected = false;
                    Err(e)
                }
                other => other,
            };
        }
        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.drain(..n);
        Ok(n)
    }
}
