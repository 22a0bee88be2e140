//! The `lnd` compression container and its byte-oriented codec.
//!
//! Compressed archive entries are wrapped in a small framed container:
//!
//! ```text
//! offset 0:  4 bytes  magic "lnd\0"
//! offset 4:  4 bytes  reserved
//! offset 8:  4 bytes  u32 LE original (decompressed) size
//! offset 12: 4 bytes  reserved
//! offset 16: compressed stream
//! ```
//!
//! The stream itself is a control-byte scheme with three opcode families:
//!
//! | control byte      | meaning                                             |
//! |-------------------|-----------------------------------------------------|
//! | `0xxxxxxx`        | literal run of `ctrl + 1` bytes copied from input   |
//! | `10ll llhh` + d   | back-reference: length `ll ll + 2`, distance        |
//! |                   | `(hh << 8) + d + 1` into the output produced so far |
//! | `11er rrrr` (+e)+b| run of byte `b`, `rrrrr + 2` repeats, extended by   |
//! |                   | `e << 5` when the `e` bit is set                    |
//!
//! Decompression runs until the declared original size is reached.  A stream
//! that ends early, overshoots its declaration, or references data before
//! the start of the output is corrupt; none of those conditions can read or
//! write out of bounds here.

use thiserror::Error;

use crate::io_stream::{ByteCursor, CursorError};

/// Magic tag of the inner compression container.
pub const LND_MAGIC: &[u8; 4] = b"lnd\0";

/// Upfront output reservation is capped; the declared size is untrusted.
const MAX_PREALLOC: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad compression magic {found:02x?}")]
    BadMagic { found: [u8; 4] },
    #[error("compressed stream ended after {produced} of {declared} declared byte(s)")]
    TruncatedStream { declared: usize, produced: usize },
    #[error("decompressed {produced} byte(s) but the header declared {declared}")]
    SizeMismatch { declared: usize, produced: usize },
    #[error("back-reference distance {distance} exceeds the {written} byte(s) written so far")]
    BadReference { distance: usize, written: usize },
    #[error(transparent)]
    Truncated(#[from] CursorError),
}

/// Parsed framing: declared original size plus the raw stream bytes.
fn parse_frame(input: &[u8]) -> Result<(usize, &[u8]), CodecError> {
    let mut cur = ByteCursor::new(input);
    let magic = cur.read(LND_MAGIC.len())?;
    if magic != &LND_MAGIC[..] {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(CodecError::BadMagic { found });
    }
    cur.skip(4)?;
    let original_size = cur.read_u32_le()? as usize;
    cur.skip(4)?;
    Ok((original_size, cur.read_to_eof()))
}

/// Peek at the declared original size of a framed buffer without
/// decompressing it.  Used to enforce output budgets cheaply.
pub fn declared_size(input: &[u8]) -> Result<usize, CodecError> {
    parse_frame(input).map(|(size, _)| size)
}

/// Unwrap a framed `lnd` container and decompress its stream.
pub fn decompress_lnd(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let (original_size, stream) = parse_frame(input)?;
    decompress(stream, original_size)
}

/// Decompress a raw stream until exactly `original_size` bytes are produced.
pub fn decompress(input: &[u8], original_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut cur = ByteCursor::new(input);
    let mut out = Vec::with_capacity(original_size.min(MAX_PREALLOC));

    while out.len() < original_size && cur.remaining() > 0 {
        let ctrl = cur.read_u8()?;
        if ctrl & 0x80 != 0 {
            if ctrl & 0x40 != 0 {
                // Run of one repeated byte.
                let mut reps = ((ctrl & 0x1F) as usize) + 2;
                if ctrl & 0x20 != 0 {
                    reps += (cur.read_u8()? as usize) << 5;
                }
                let byte = cur.read_u8()?;
                out.resize(out.len() + reps, byte);
            } else {
                // Back-reference into the output produced so far.  Copies go
                // byte-at-a-time: a distance smaller than the length repeats
                // the trailing bytes, which the format relies on.
                let len = (((ctrl >> 2) & 0x0F) as usize) + 2;
                let distance = (((ctrl & 0x03) as usize) << 8) + cur.read_u8()? as usize + 1;
                if distance > out.len() {
                    return Err(CodecError::BadReference {
                        distance,
                        written: out.len(),
                    });
                }
                for _ in 0..len {
                    let byte = out[out.len() - distance];
                    out.push(byte);
                }
            }
        } else {
            // Literal run.
            let len = ctrl as usize + 1;
            out.extend_from_slice(cur.read(len)?);
        }
    }

    if out.len() < original_size {
        return Err(CodecError::TruncatedStream {
            declared: original_size,
            produced: out.len(),
        });
    }
    if out.len() > original_size {
        return Err(CodecError::SizeMismatch {
            declared: original_size,
            produced: out.len(),
        });
    }
    Ok(out)
}

// ── Encoder ──────────────────────────────────────────────────────────────────
//
// The original tooling only ever decompresses; this encoder exists so tests
// and benchmarks can build valid streams.  It emits literal and run opcodes
// only (no back-reference search), and its output always decodes to the
// input bit-for-bit.

/// Longest run a single (extended) RLE opcode can express: 2 + 31 + 255·32.
const MAX_RUN: usize = 8193;
/// Longest literal run a single opcode can express.
const MAX_LITERAL: usize = 128;

/// Wrap [`compress`] output in the framed `lnd` container.
pub fn compress_lnd(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + input.len() + input.len() / MAX_LITERAL + 1);
    out.extend_from_slice(LND_MAGIC);
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(input.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    compress_into(input, &mut out);
    out
}

/// Encode `input` as a raw stream of literal and run opcodes.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / MAX_LITERAL + 1);
    compress_into(input, &mut out);
    out
}

fn compress_into(input: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        let mut run = 1;
        while i + run < input.len() && input[i + run] == byte && run < MAX_RUN {
            run += 1;
        }

        if run >= 3 {
            let v = run - 2;
            let low = (v & 0x1F) as u8;
            let ext = v >> 5;
            if ext > 0 {
                out.push(0xC0 | 0x20 | low);
                out.push(ext as u8);
            } else {
                out.push(0xC0 | low);
            }
            out.push(byte);
            i += run;
            continue;
        }

        // Literal run: stop at the opcode limit or where an RLE-worthy run
        // begins.
        let start = i;
        let mut end = i;
        while end < input.len() && end - start < MAX_LITERAL {
            if end + 2 < input.len()
                && input[end] == input[end + 1]
                && input[end] == input[end + 2]
            {
                break;
            }
            end += 1;
        }
        out.push((end - start - 1) as u8);
        out.extend_from_slice(&input[start..end]);
        i = end;
    }
}
