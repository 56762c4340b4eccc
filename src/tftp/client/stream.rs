use std::io::{self, Read, Write};

use crate::tftp::core::MAX_DATA_SIZE;
use crate::tftp::error::{Error, Result};

/// Sequential source of outgoing blocks
pub trait BlockSource {
    /// Next block of at most 512 bytes; empty once the source is exhausted
    fn read_block(&mut self) -> Result<Vec<u8>>;
}

/// Sequential sink for incoming blocks
pub trait BlockSink {
    fn write_block(&mut self, block: &[u8]) -> Result<()>;

    /// Called once after the final block
    fn finish(&mut self) -> Result<()>;
}

/// Cuts any reader into full 512-byte blocks
pub struct BlockReader<R> {
    inner: R,
    eof: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, eof: false }
    }
}

impl<R: Read> BlockSource for BlockReader<R> {
    fn read_block(&mut self) -> Result<Vec<u8>> {
        let mut block = vec![0u8; MAX_DATA_SIZE];
        let mut filled = 0;

        // Short reads are not the end of the file, only Ok(0) is
        while !self.eof && filled < MAX_DATA_SIZE {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::File(e)),
            }
        }

        block.truncate(filled);
        Ok(block)
    }
}

pub struct BlockWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> BlockSink for BlockWriter<W> {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        self.inner.write_all(block).map_err(Error::File)?;
        self.written += block.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush().map_err(Error::File)
    }
}
