//! Table-of-contents parser.
//!
//! The table sits directly after the container magic:
//!
//! ```text
//! 4 bytes   u32 LE entry count
//! 8 bytes   reserved
//! count × 32-byte records:
//!     4 bytes   u32 LE offset, relative to the end of the table
//!     4 bytes   u32 LE (size << 1 | compressed flag)
//!     24 bytes  name, null-padded
//! ```
//!
//! Record order is preserved; extraction emits entries in table order.
//! Offset/size validation against the container happens at extraction time —
//! the parser only rejects an entry count whose records could not possibly
//! fit in the remaining bytes.

use thiserror::Error;

use crate::io_stream::{ByteCursor, CursorError};
use crate::obfuscate;

/// On-disk size of one table record.
pub const RECORD_SIZE: usize = 32;

const NAME_FIELD: usize = 24;
const RESERVED_AFTER_COUNT: usize = 8;

/// One packed file's metadata, with the payload offset already resolved to
/// an absolute position in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub name: String,
    /// Keystream seed captured from the raw stored name bytes, before any
    /// lossy character conversion (see [`crate::obfuscate::name_key`]).
    pub name_key: u8,
    pub compressed: bool,
    /// Absolute byte offset of the payload in the container.
    pub offset: u64,
    /// Stored (possibly compressed) payload length.
    pub size: u32,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table declares {count} entries but only {remaining} byte(s) follow the header")]
    ImplausibleCount { count: u32, remaining: usize },
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Parse the table of contents.  The cursor must be positioned right after
/// the container magic.
pub fn read_table(cur: &mut ByteCursor<'_>) -> Result<Vec<TableEntry>, TableError> {
    let count = cur.read_u32_le()?;
    cur.skip(RESERVED_AFTER_COUNT)?;

    // A count whose records alone overrun the buffer is corrupt; reject it
    // before sizing the entry arena from it.
    if u64::from(count) * RECORD_SIZE as u64 > cur.remaining() as u64 {
        return Err(TableError::ImplausibleCount {
            count,
            remaining: cur.remaining(),
        });
    }

    let file_data_start = (cur.tell() + count as usize * RECORD_SIZE) as u64;
    let mut table = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let relative = cur.read_u32_le()?;
        let word = cur.read_u32_le()?;
        let raw_name = cur.read_to_zero(NAME_FIELD)?;
        table.push(TableEntry {
            name:       String::from_utf8_lossy(raw_name).into_owned(),
            name_key:   obfuscate::name_key(raw_name),
            compressed: word & 1 != 0,
            offset:     u64::from(relative) + file_data_start,
            size:       word >> 1,
        });
    }
    Ok(table)
}
