use std::io::Read;
use vrts_common::VrtsError;

/// Two equal-offset chunks read from the compared streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPair {
    /// Byte offset of both chunks in their files
    pub offset: u64,
    pub first: Vec<u8>,
    pub second: Vec<u8>,
}

/// Reads two streams in lock-step, one fixed-size chunk at a time
pub struct ChunkedReader<A, B> {
    first: A,
    second: B,
    chunk_size: usize,
    offset: u64,
}

impl<A: Read, B: Read> ChunkedReader<A, B> {
    pub fn new(first: A, second: B, chunk_size: usize) -> Self {
        Self {
            first,
            second,
            chunk_size: chunk_size.max(1),
            offset: 0,
        }
    }

    /// Current read position, shared by both streams
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read up to `size` leading bytes from both streams
    pub fn read_header(&mut self, size: u64) -> Result<ChunkPair, VrtsError> {
        let offset = self.offset;
        let first = read_up_to(&mut self.first, size)?;
        let second = read_up_to(&mut self.second, size)?;
        self.offset += size;

        Ok(ChunkPair {
            offset,
            first,
            second,
        })
    }

    /// Read the next pair of chunks, `None` once either stream is exhausted
    pub fn next_pair(&mut self) -> Result<Option<ChunkPair>, VrtsError> {
        let offset = self.offset;
        let first = read_up_to(&mut self.first, self.chunk_size as u64)?;
        let second = read_up_to(&mut self.second, self.chunk_size as u64)?;

        if first.is_empty() || second.is_empty() {
            return Ok(None);
        }

        self.offset += self.chunk_size as u64;
        Ok(Some(ChunkPair {
            offset,
            first,
            second,
        }))
    }
}

// Keeps reading until `limit` bytes or EOF, so chunks are only short at the end.
fn read_up_to<R: Read>(reader: &mut R, limit: u64) -> Result<Vec<u8>, VrtsError> {
    let mut buffer = Vec::with_capacity(limit.min(1 << 24) as usize);
    reader.by_ref().take(limit).read_to_end(&mut buffer)?;
    Ok(buffer)
}
