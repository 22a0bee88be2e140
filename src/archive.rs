//! LNK container recognition and extraction.
//!
//! [`recognize`] is the cheap probe used to test whether a buffer is an LNK
//! container at all; it never fails, it answers.  [`extract`] does the full
//! pass: parse the table, then per entry bounds-check, copy, reverse the
//! filename-keyed obfuscation, unwrap the compression container when the
//! entry is flagged, and hand the result to the sink.
//!
//! Per-entry failures are policy ([`ErrorPolicy`]): real-world archives are
//! often partially corrupt, so the default records the failure in the
//! [`ExtractReport`] and keeps going.  `Abort` propagates the first failure
//! with the entry's name and offset attached.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{self, CodecError};
use crate::dispatch::DecoderRegistry;
use crate::io_stream::{ByteCursor, CursorError};
use crate::obfuscate;
use crate::table::{self, TableEntry, TableError};

/// Magic tag of the outer archive container.
pub const LNK_MAGIC: &[u8; 4] = b"LNK\0";

/// One extracted file: the stored name and the fully decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub name:    String,
    pub content: Vec<u8>,
}

// ── Options ──────────────────────────────────────────────────────────────────

/// What to do when a single entry fails to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the failure in the report and continue with remaining entries.
    #[default]
    Skip,
    /// Fail the whole extraction on the first bad entry.
    Abort,
}

/// Extraction configuration.  Budgets default to off; they are caller
/// policy, not format rules.
#[derive(Debug)]
pub struct ExtractOptions {
    pub on_entry_error: ErrorPolicy,
    /// Refuse archives whose table declares more entries than this.
    pub max_entries: Option<usize>,
    /// Refuse any single entry whose decoded output would exceed this many
    /// bytes (decompression-bomb guard; checked against the declared size
    /// before decompressing).
    pub max_output_bytes: Option<u64>,
    /// Sub-decoders offered each successfully extracted file.  The default
    /// is an empty registry: bytes pass through exactly as stored.
    pub registry: DecoderRegistry,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            on_entry_error:   ErrorPolicy::Skip,
            max_entries:      None,
            max_output_bytes: None,
            registry:         DecoderRegistry::empty(),
        }
    }
}

// ── Errors & report ──────────────────────────────────────────────────────────

/// Failure extracting one entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("payload at {offset:#x}+{size:#x} overruns the {len}-byte container")]
    OutOfRange { offset: u64, size: u32, len: usize },
    #[error("declared output of {declared} byte(s) exceeds the {limit}-byte budget")]
    OutputBudget { declared: u64, limit: u64 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("sink rejected entry: {0}")]
    Sink(#[from] io::Error),
}

/// Failure of the whole extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not an LNK container (bad magic)")]
    FormatMismatch,
    #[error("table declares {count} entries, more than the {max}-entry budget")]
    TooManyEntries { count: usize, max: usize },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("entry `{name}` at {offset:#x}: {source}")]
    Entry {
        name:   String,
        offset: u64,
        source: EntryError,
    },
}

/// Per-entry diagnostic for a failure that was skipped over.
#[derive(Debug)]
pub struct SkippedEntry {
    pub name:   String,
    pub offset: u64,
    pub error:  EntryError,
}

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub extracted: usize,
    pub skipped:   Vec<SkippedEntry>,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

// ── Sinks ────────────────────────────────────────────────────────────────────

/// Receiver for extracted files; ownership of each file transfers on `save`.
pub trait FileSink {
    fn save(&mut self, file: ExtractedFile) -> io::Result<()>;
}

/// Collects extracted files in memory, in emission order.
#[derive(Debug, Default)]
pub struct VecSink {
    pub files: Vec<ExtractedFile>,
}

impl FileSink for VecSink {
    fn save(&mut self, file: ExtractedFile) -> io::Result<()> {
        self.files.push(file);
        Ok(())
    }
}

/// Writes each extracted file under a target directory.
///
/// Stored names are flat; a name carrying a path separator or `..` is
/// rejected rather than resolved, so output can never land outside `root`.
#[derive(Debug)]
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl FileSink for DirSink {
    fn save(&mut self, file: ExtractedFile) -> io::Result<()> {
        if file.name.is_empty()
            || file.name.contains(['/', '\\'])
            || file.name.contains("..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe entry name: {:?}", file.name),
            ));
        }
        std::fs::write(self.root.join(&file.name), &file.content)
    }
}

// ── Recognition ──────────────────────────────────────────────────────────────

/// True iff `data` starts with the LNK container magic.
///
/// Pure and allocation-free; callers probe many formats in a row with this,
/// so a mismatch is a `false`, never an error.
pub fn recognize(data: &[u8]) -> bool {
    data.starts_with(LNK_MAGIC)
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Parse the table of contents without extracting any payload.
pub fn read_entries(container: &[u8]) -> Result<Vec<TableEntry>, ExtractError> {
    if !recognize(container) {
        return Err(ExtractError::FormatMismatch);
    }
    let mut cur = ByteCursor::new(container);
    cur.seek(LNK_MAGIC.len()).map_err(TableError::Cursor)?;
    Ok(table::read_table(&mut cur)?)
}

/// Decode a single entry's payload: bounds-check, copy, de-obfuscate,
/// decompress.  Pure with respect to the container; the entry's output
/// buffer is exclusively owned from here until hand-off.
pub fn read_entry(
    container: &[u8],
    entry: &TableEntry,
    opts: &ExtractOptions,
) -> Result<ExtractedFile, EntryError> {
    let end = entry.offset + u64::from(entry.size);
    if end > container.len() as u64 {
        return Err(EntryError::OutOfRange {
            offset: entry.offset,
            size:   entry.size,
            len:    container.len(),
        });
    }
    let start = entry.offset as usize;
    let mut data = container[start..start + entry.size as usize].to_vec();

    obfuscate::decode_prefix(&entry.name, entry.name_key, &mut data);

    let content = if entry.compressed {
        let declared = codec::declared_size(&data)? as u64;
        if let Some(limit) = opts.max_output_bytes {
            if declared > limit {
                return Err(EntryError::OutputBudget { declared, limit });
            }
        }
        codec::decompress_lnd(&data)?
    } else {
        if let Some(limit) = opts.max_output_bytes {
            if u64::from(entry.size) > limit {
                return Err(EntryError::OutputBudget {
                    declared: u64::from(entry.size),
                    limit,
                });
            }
        }
        data
    };

    Ok(ExtractedFile {
        name: entry.name.clone(),
        content,
    })
}

/// Extract every entry of `container` into `sink`, in table order.
///
/// Returns the report on success; whether a bad entry fails the whole pass
/// is governed by [`ExtractOptions::on_entry_error`].
pub fn extract<S: FileSink>(
    container: &[u8],
    sink: &mut S,
    opts: &ExtractOptions,
) -> Result<ExtractReport, ExtractError> {
    let entries = read_entries(container)?;
    if let Some(max) = opts.max_entries {
        if entries.len() > max {
            return Err(ExtractError::TooManyEntries {
                count: entries.len(),
                max,
            });
        }
    }
    debug!(entries = entries.len(), "extracting LNK container");

    let decoded = decode_all(container, &entries, opts);

    let mut report = ExtractReport::default();
    for (entry, result) in entries.iter().zip(decoded) {
        let result = result.and_then(|file| {
            let file = opts.registry.refine(file);
            sink.save(file).map_err(EntryError::Sink)
        });
        match result {
            Ok(()) => report.extracted += 1,
            Err(error) => match opts.on_entry_error {
                ErrorPolicy::Abort => {
                    return Err(ExtractError::Entry {
                        name:   entry.name.clone(),
                        offset: entry.offset,
                        source: error,
                    });
                }
                ErrorPolicy::Skip => {
                    warn!(entry = %entry.name, offset = entry.offset, %error, "skipping bad entry");
                    report.skipped.push(SkippedEntry {
                        name: entry.name.clone(),
                        offset: entry.offset,
                        error,
                    });
                }
            },
        }
    }
    Ok(report)
}

// Entries are independent: each decode touches only the shared immutable
// container and its own output buffer, so the per-entry work can fan out.
// Emission stays in table order either way.
#[cfg(feature = "parallel")]
fn decode_all(
    container: &[u8],
    entries: &[TableEntry],
    opts: &ExtractOptions,
) -> Vec<Result<ExtractedFile, EntryError>> {
    use rayon::prelude::*;

    entries
        .par_iter()
        .map(|entry| read_entry(container, entry, opts))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn decode_all(
    container: &[u8],
    entries: &[TableEntry],
    opts: &ExtractOptions,
) -> Vec<Result<ExtractedFile, EntryError>> {
    entries
        .iter()
        .map(|entry| read_entry(container, entry, opts))
        .collect()
}
