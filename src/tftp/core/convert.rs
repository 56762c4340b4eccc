//! NetASCII line-ending translation
//!
//! On the wire every line ends with CR LF and a bare CR is sent as CR NUL.
//! Locally a line ends with LF.

use std::io::{self, Read, Write};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const NUL: u8 = 0;

/// Encodes local text into netascii as it is read
pub struct NetasciiReader<R> {
    inner: R,
    pending: Option<u8>,
}

impl<R: Read> NetasciiReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: None,
        }
    }
}

impl<R: Read> Read for NetasciiReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut n = 0;
        if let Some(b) = self.pending.take() {
            buf[0] = b;
            n = 1;
        }

        let mut byte = [0u8; 1];
        while n < buf.len() {
            match self.inner.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let (first, second) = match byte[0] {
                LF => (CR, Some(LF)),
                CR => (CR, Some(NUL)),
                b => (b, None),
            };
            buf[n] = first;
            n += 1;

            if let Some(second) = second {
                if n < buf.len() {
                    buf[n] = second;
                    n += 1;
                } else {
                    // Pair split across reads
                    self.pending = Some(second);
                }
            }
        }

        Ok(n)
    }
}

/// Decodes netascii back into local text as it is written
///
/// A CR at the end of one write is held until the next byte arrives;
/// `flush` releases it.
pub struct NetasciiWriter<W: Write> {
    inner: W,
    pending_cr: bool,
}

impl<W: Write> NetasciiWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending_cr: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for NetasciiWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + 1);

        for &b in buf {
            if self.pending_cr {
                self.pending_cr = false;
                match b {
                    LF => out.push(LF),
                    NUL => out.push(CR),
                    CR => {
                        out.push(CR);
                        self.pending_cr = true;
                    }
                    other => {
                        out.push(CR);
                        out.push(other);
                    }
                }
            } else if b == CR {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }

        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending_cr {
            self.pending_cr = false;
            self.inner.write_all(&[CR])?;
        }
        self.inner.flush()
    }
}
