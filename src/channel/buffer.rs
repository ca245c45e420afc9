//! Staging buffer for bytes pulled ahead of a reader's request.

/// Fixed-capacity byte buffer with independent read and write cursors.
///
/// Only the readiness probe writes into it. Reads drain it before touching
/// the source again, and a drain that empties it resets both cursors to the
/// start.
#[derive(Debug)]
pub struct ByteBuffer {
    data: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl ByteBuffer {
    /// Allocate a buffer holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of staged bytes not yet handed to a reader.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.write_pos - self.read_pos
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unread() == 0
    }

    #[must_use]
    pub fn cursors(&self) -> (usize, usize) {
        (self.read_pos, self.write_pos)
    }

    /// Append bytes at the write cursor.
    ///
    /// Returns how many bytes fit; anything past the capacity is not stored.
    pub fn stage(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.capacity() - self.write_pos);
        self.data[self.write_pos..self.write_pos + count].copy_from_slice(&bytes[..count]);
        self.write_pos += count;
        count
    }

    /// Move up to `size` staged bytes into `out`, returning the count moved.
    ///
    /// When `size` covers everything staged the buffer is emptied and both
    /// cursors return to zero.
    pub fn drain_into(&mut self, out: &mut Vec<u8>, size: usize) -> usize {
        let unread = self.unread();
        if unread == 0 {
            return 0;
        }

        if size < unread {
            out.extend_from_slice(&self.data[self.read_pos..self.read_pos + size]);
            self.read_pos += size;
            return size;
        }

        out.extend_from_slice(&self.data[self.read_pos..self.write_pos]);
        self.read_pos = 0;
        self.write_pos = 0;
        unread
    }
}
