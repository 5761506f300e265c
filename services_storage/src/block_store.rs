//! Positional block store
//!
//! Turns a flat, byte-addressable medium into a chain of named,
//! variable-length records.
//!
//! ## Layout
//!
//! ```text
//! offset 0   u16 magic cookie (0xFA19)
//! offset 2   { id: u16, size: u16, next: u16 } header, then `size` data bytes
//!            { id, size, next } ... repeated ...
//!            { id: 0, size: 0, next: 0 }    EOF marker, always last
//! ```
//!
//! All fields are little-endian. `next` is the offset of the following
//! header, i.e. `offset + 6 + size`.
//!
//! ## Allocation
//!
//! - A block requested with a size that fits its existing data region is
//!   reused in place. Blocks never shrink, so space freed by a smaller
//!   payload stays with the block until it is deleted.
//! - A block requested with a larger size is deleted and re-appended at the
//!   end of the chain.
//! - Deleting a block compacts every following block to the left by the
//!   deleted span and moves the EOF marker with them.
//!
//! A single [`BlockTransaction`] cursor is shared by the whole store; opening
//! a second block while one is open fails instead of corrupting state.

use crate::error::{StorageError, StorageResult};
use hal::StorageMedium;

/// Marks a formatted medium
pub const MAGIC_COOKIE: u16 = 0xFA19;

/// Bytes taken by the cookie at offset 0
pub const COOKIE_SIZE: usize = 2;

/// Offset of the first block header
pub const FIRST_BLOCK_OFFSET: usize = COOKIE_SIZE;

/// Largest offset a header can point to
const MAX_OFFSET: usize = u16::MAX as usize;

/// Copy granularity used while compacting
const COPY_CHUNK: usize = 32;

/// Fixed-size record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    /// Numeric identity, 0 for the EOF marker
    pub id: u16,
    /// Bytes of data following the header
    pub size: u16,
    /// Offset of the following header
    pub next: u16,
}

impl BlockHeader {
    /// Size of a serialized header in bytes
    pub const SIZE: usize = 6;

    /// The zeroed end-of-chain marker
    pub const fn eof() -> Self {
        Self {
            id: 0,
            size: 0,
            next: 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.id == 0
    }

    /// Header plus data bytes
    pub fn span(&self) -> usize {
        Self::SIZE + self.size as usize
    }

    /// Serialize header to bytes (little-endian)
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.id.to_le_bytes());
        buf[2..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..6].copy_from_slice(&self.next.to_le_bytes());
        buf
    }

    /// Deserialize header from bytes (little-endian)
    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            id: u16::from_le_bytes([buf[0], buf[1]]),
            size: u16::from_le_bytes([buf[2], buf[3]]),
            next: u16::from_le_bytes([buf[4], buf[5]]),
        }
    }
}

/// Cursor into the data region of the open block
#[derive(Debug, Clone, Default)]
pub struct BlockTransaction {
    locked: bool,
    header_offset: usize,
    header: BlockHeader,
    position: usize,
}

impl BlockTransaction {
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Offset of the open block's header
    pub fn offset(&self) -> usize {
        self.header_offset
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    /// Bytes already read or written
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left in the data region
    pub fn remaining(&self) -> usize {
        (self.header.size as usize).saturating_sub(self.position)
    }

    fn data_offset(&self) -> usize {
        self.header_offset + BlockHeader::SIZE + self.position
    }
}

/// Block allocator over a byte-addressable medium
pub struct BlockStore<M: StorageMedium> {
    medium: M,
    transaction: BlockTransaction,
    formatted: bool,
}

impl<M: StorageMedium> BlockStore<M> {
    /// Wraps a medium. Nothing is read or written until first use.
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            transaction: BlockTransaction::default(),
            formatted: false,
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    /// Releases the medium, e.g. to simulate a power cycle
    pub fn into_medium(self) -> M {
        self.medium
    }

    /// The shared transaction cursor
    pub fn transaction(&self) -> &BlockTransaction {
        &self.transaction
    }

    /// Whether the medium carries the magic cookie
    pub fn is_formatted(&mut self) -> StorageResult<bool> {
        let mut cookie = [0u8; COOKIE_SIZE];
        self.medium.read(0, &mut cookie)?;
        Ok(u16::from_le_bytes(cookie) == MAGIC_COOKIE)
    }

    fn ensure_formatted(&mut self) -> StorageResult<()> {
        if self.formatted {
            return Ok(());
        }
        if !self.is_formatted()? {
            log::info!("storage medium not initialized, formatting");
            self.format()?;
        }
        self.formatted = true;
        Ok(())
    }

    /// Writes the cookie and a single EOF header
    fn format(&mut self) -> StorageResult<()> {
        let needed = FIRST_BLOCK_OFFSET + BlockHeader::SIZE;
        if self.medium.capacity() < needed {
            return Err(StorageError::NoSpace {
                needed,
                available: self.medium.capacity(),
            });
        }
        self.medium.write(0, &MAGIC_COOKIE.to_le_bytes())?;
        self.write_header(FIRST_BLOCK_OFFSET, &BlockHeader::eof())?;
        self.medium.commit()?;
        Ok(())
    }

    fn read_header(&mut self, offset: usize) -> StorageResult<BlockHeader> {
        let mut buf = [0u8; BlockHeader::SIZE];
        self.medium.read(offset, &mut buf)?;
        Ok(BlockHeader::from_bytes(&buf))
    }

    fn write_header(&mut self, offset: usize, header: &BlockHeader) -> StorageResult<()> {
        self.medium.write(offset, &header.to_bytes())?;
        Ok(())
    }

    /// Checks that a non-EOF header links to where its data ends
    fn check_link(&self, offset: usize, header: &BlockHeader) -> StorageResult<()> {
        let expected = offset + header.span();
        let next = header.next as usize;
        if next != expected || next + BlockHeader::SIZE > self.medium.capacity() {
            return Err(StorageError::CorruptChain(offset));
        }
        Ok(())
    }

    /// Scans the chain for `id`
    ///
    /// Returns the offset and header of the matching block, or of the EOF
    /// marker when `id` is not stored.
    pub fn find_block(&mut self, id: u16) -> StorageResult<(usize, BlockHeader)> {
        self.ensure_formatted()?;
        let mut offset = FIRST_BLOCK_OFFSET;
        loop {
            let header = self.read_header(offset)?;
            if header.is_eof() || header.id == id {
                return Ok((offset, header));
            }
            self.check_link(offset, &header)?;
            offset = header.next as usize;
        }
    }

    /// Returns the offset of a block for `id` with at least `size` data bytes
    ///
    /// Reuses a large-enough existing block, relocates a too-small one to the
    /// end of the chain, or appends a new one.
    pub fn get_block_header(&mut self, id: u16, size: usize) -> StorageResult<usize> {
        if id == 0 {
            return Err(StorageError::ReservedId);
        }
        loop {
            let (offset, header) = self.find_block(id)?;
            if header.is_eof() {
                return self.allocate(offset, id, size);
            }
            if size <= header.size as usize {
                return Ok(offset);
            }
            // The relocated block must fit once the old one is reclaimed
            let (eof, _) = self.find_block(0)?;
            self.check_fits(eof - header.span(), size)?;
            log::debug!(
                "block {:#06x} grows from {} to {} bytes, relocating",
                id,
                header.size,
                size
            );
            self.delete_block(id)?;
        }
    }

    /// Checks that a block of `size` bytes fits at `eof_offset`
    fn check_fits(&self, eof_offset: usize, size: usize) -> StorageResult<()> {
        let data_end = eof_offset + BlockHeader::SIZE + size;
        let needed = data_end + BlockHeader::SIZE;
        let limit = self.medium.capacity().min(MAX_OFFSET + 1);
        if size > u16::MAX as usize || data_end > MAX_OFFSET || needed > limit {
            return Err(StorageError::NoSpace {
                needed: BlockHeader::SIZE + size,
                available: limit.saturating_sub(eof_offset + BlockHeader::SIZE),
            });
        }
        Ok(())
    }

    /// Appends a block at the current EOF offset
    fn allocate(&mut self, eof_offset: usize, id: u16, size: usize) -> StorageResult<usize> {
        self.check_fits(eof_offset, size)?;
        let data_end = eof_offset + BlockHeader::SIZE + size;

        let header = BlockHeader {
            id,
            size: size as u16,
            next: data_end as u16,
        };
        self.write_header(eof_offset, &header)?;
        self.write_header(data_end, &BlockHeader::eof())?;
        self.medium.commit()?;
        log::debug!(
            "allocated block {:#06x} ({} bytes) at offset {}",
            id,
            size,
            eof_offset
        );
        Ok(eof_offset)
    }

    /// Removes the block for `id` and compacts the following blocks
    ///
    /// Deleting an absent id is a no-op.
    pub fn delete_block(&mut self, id: u16) -> StorageResult<()> {
        if self.transaction.locked {
            return Err(self.conflict());
        }
        let (target, header) = self.find_block(id)?;
        if header.is_eof() {
            return Ok(());
        }
        self.check_link(target, &header)?;

        let mut src = header.next as usize;
        let mut dest = target;
        loop {
            let moving = self.read_header(src)?;
            if moving.is_eof() {
                self.write_header(dest, &BlockHeader::eof())?;
                break;
            }
            self.check_link(src, &moving)?;

            let moved_next = dest + moving.span();
            self.write_header(
                dest,
                &BlockHeader {
                    next: moved_next as u16,
                    ..moving
                },
            )?;
            self.copy_data(
                src + BlockHeader::SIZE,
                dest + BlockHeader::SIZE,
                moving.size as usize,
            )?;

            src = moving.next as usize;
            dest = moved_next;
        }
        self.medium.commit()?;
        log::debug!("deleted block {:#06x} at offset {}", id, target);
        Ok(())
    }

    /// Moves `len` bytes from `src` down to `dest` (`dest < src`)
    fn copy_data(&mut self, src: usize, dest: usize, len: usize) -> StorageResult<()> {
        let mut buf = [0u8; COPY_CHUNK];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(COPY_CHUNK);
            self.medium.read(src + done, &mut buf[..n])?;
            self.medium.write(dest + done, &buf[..n])?;
            done += n;
        }
        Ok(())
    }

    fn conflict(&self) -> StorageError {
        StorageError::TransactionConflict(format!("{:#06x}", self.transaction.header.id))
    }

    fn lock(&mut self, offset: usize) -> StorageResult<()> {
        let header = self.read_header(offset)?;
        self.transaction = BlockTransaction {
            locked: true,
            header_offset: offset,
            header,
            position: 0,
        };
        Ok(())
    }

    /// Opens (allocating if needed) the block for `id` with room for `size` bytes
    ///
    /// Fails with [`StorageError::TransactionConflict`] while another block
    /// is open; the medium is not touched in that case.
    pub fn begin_block(&mut self, id: u16, size: usize) -> StorageResult<usize> {
        if self.transaction.locked {
            let err = self.conflict();
            log::error!("begin_block({:#06x}) rejected: {}", id, err);
            return Err(err);
        }
        let offset = self.get_block_header(id, size)?;
        self.lock(offset)?;
        Ok(offset)
    }

    /// Opens an existing block for reading without allocating
    pub fn begin_existing_block(&mut self, id: u16) -> StorageResult<usize> {
        if self.transaction.locked {
            let err = self.conflict();
            log::error!("begin_existing_block({:#06x}) rejected: {}", id, err);
            return Err(err);
        }
        if id == 0 {
            return Err(StorageError::ReservedId);
        }
        let (offset, header) = self.find_block(id)?;
        if header.is_eof() {
            return Err(StorageError::BlockNotFound(format!("{:#06x}", id)));
        }
        self.lock(offset)?;
        Ok(offset)
    }

    /// Reads the next `buf.len()` bytes of the open block
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        if !self.transaction.locked {
            return Err(StorageError::NoTransaction);
        }
        let remaining = self.transaction.remaining();
        if buf.len() > remaining {
            return Err(StorageError::ReadPastEnd {
                needed: buf.len(),
                remaining,
            });
        }
        self.medium.read(self.transaction.data_offset(), buf)?;
        self.transaction.position += buf.len();
        Ok(())
    }

    /// Writes `data` at the cursor of the open block
    pub fn write_bytes(&mut self, data: &[u8]) -> StorageResult<()> {
        if !self.transaction.locked {
            return Err(StorageError::NoTransaction);
        }
        let remaining = self.transaction.remaining();
        if data.len() > remaining {
            return Err(StorageError::WritePastEnd {
                needed: data.len(),
                remaining,
            });
        }
        self.medium.write(self.transaction.data_offset(), data)?;
        self.transaction.position += data.len();
        Ok(())
    }

    /// Closes the open block and commits the medium
    pub fn end_block(&mut self) -> StorageResult<()> {
        if !self.transaction.locked {
            return Err(StorageError::NoTransaction);
        }
        self.transaction = BlockTransaction::default();
        self.medium.commit()?;
        Ok(())
    }

    /// Reformats the medium, destroying every block
    pub fn reset_storage(&mut self) -> StorageResult<()> {
        if self.transaction.locked {
            return Err(self.conflict());
        }
        log::info!("resetting block storage");
        self.format()?;
        self.formatted = true;
        Ok(())
    }

    /// Bytes in use, from offset 0 through the EOF header
    pub fn used_bytes(&mut self) -> StorageResult<usize> {
        let (eof, _) = self.find_block(0)?;
        Ok(eof + BlockHeader::SIZE)
    }

    /// Every stored block in chain order (EOF excluded)
    pub fn block_headers(&mut self) -> StorageResult<Vec<(usize, BlockHeader)>> {
        self.ensure_formatted()?;
        let mut blocks = Vec::new();
        let mut offset = FIRST_BLOCK_OFFSET;
        loop {
            let header = self.read_header(offset)?;
            if header.is_eof() {
                return Ok(blocks);
            }
            self.check_link(offset, &header)?;
            blocks.push((offset, header));
            offset = header.next as usize;
        }
    }
}
