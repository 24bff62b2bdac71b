//! Line sources.
//!
//! Endpoints print newline-terminated text, but a serial link can deliver
//! garbage bytes (baud mismatch, reset noise). Lines are read as raw bytes
//! and decoded here; a line that is not UTF-8 is reported as
//! [`SourceLine::Undecodable`] and never reaches the estimation core. So is
//! a line longer than [`MAX_LINE`], which keeps a source that never sends a
//! newline from growing the read buffer.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use crate::config::SourcePath;

/// Longest line kept, in bytes. Anything longer is reported as undecodable.
pub const MAX_LINE: usize = 1024;

/// One line from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    /// Trimmed, non-empty text.
    Text(String),
    Undecodable,
}

/// Iterator over the non-empty lines of a byte stream.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(256),
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<SourceLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match (&mut self.inner)
                .take(MAX_LINE as u64)
                .read_until(b'\n', &mut self.buf)
            {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
            if self.buf.len() == MAX_LINE && self.buf.last() != Some(&b'\n') {
                return Some(skip_line(&mut self.inner).map(|()| SourceLine::Undecodable));
            }
            match std::str::from_utf8(&self.buf) {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Some(Ok(SourceLine::Text(text.to_string())));
                }
                Err(_) => return Some(Ok(SourceLine::Undecodable)),
            }
        }
    }
}

/// Discard input up to and including the next newline.
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let chunk = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|b| *b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let n = chunk.len();
                reader.consume(n);
            }
        }
    }
}

/// Open a configured source for line reading.
pub fn open(path: &SourcePath) -> io::Result<LineReader<Box<dyn BufRead + Send>>> {
    let reader: Box<dyn BufRead + Send> = match path {
        SourcePath::Stdin => Box::new(BufReader::new(io::stdin())),
        SourcePath::File(p) => Box::new(BufReader::new(File::open(p)?)),
    };
    Ok(LineReader::new(reader))
}
