//! Opportunistic sub-decoders for extracted payloads.
//!
//! After an entry's bytes have been extracted, the archive layer offers them
//! to this registry keyed on the entry's file extension.  A decoder either
//! claims the content and returns the decoded replacement, declines with
//! `Ok(None)`, or fails.  A failure only means the bytes stay as they came
//! out of the archive, never that extraction fails.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::archive::ExtractedFile;
use crate::codec::{self, CodecError};

/// A content-type decoder that can be tried against extracted bytes.
pub trait SubDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some(_))` — content recognized and decoded.
    /// `Ok(None)` — not this decoder's content (routine, not an error).
    /// `Err(_)` — content matched the decoder's format but is corrupt.
    fn try_decode(&self, file: &ExtractedFile) -> Result<Option<ExtractedFile>, CodecError>;
}

/// Extension-keyed lookup table of [`SubDecoder`]s.
pub struct DecoderRegistry {
    by_ext: HashMap<String, Box<dyn SubDecoder>>,
}

impl DecoderRegistry {
    /// A registry that decodes nothing; every file passes through verbatim.
    pub fn empty() -> Self {
        Self {
            by_ext: HashMap::new(),
        }
    }

    /// A registry with the built-in decoders installed.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("lnd", Box::new(LndBlobDecoder));
        registry
    }

    pub fn register(&mut self, extension: &str, decoder: Box<dyn SubDecoder>) {
        self.by_ext
            .insert(extension.to_ascii_lowercase(), decoder);
    }

    /// Look up a decoder by the file's extension hint and try it.
    pub fn try_decode(&self, file: &ExtractedFile) -> Result<Option<ExtractedFile>, CodecError> {
        let Some(ext) = extension(&file.name) else {
            return Ok(None);
        };
        let Some(decoder) = self.by_ext.get(&ext) else {
            return Ok(None);
        };
        debug!(entry = %file.name, decoder = decoder.name(), "trying sub-decoder");
        decoder.try_decode(file)
    }

    /// Run `file` through the registry, keeping the raw bytes whenever no
    /// decoder claims them or the claiming decoder fails.
    pub fn refine(&self, file: ExtractedFile) -> ExtractedFile {
        match self.try_decode(&file) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => file,
            Err(e) => {
                warn!(entry = %file.name, error = %e, "sub-decoder failed; keeping raw bytes");
                file
            }
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&str> = self.by_ext.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        f.debug_struct("DecoderRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

// ── Built-in decoders ────────────────────────────────────────────────────────

/// Unwraps entries that are standalone framed `lnd` containers.
///
/// Some archives store pre-compressed blobs (script data mostly) as plain
/// uncompressed entries whose content is itself an `lnd` container.
pub struct LndBlobDecoder;

impl SubDecoder for LndBlobDecoder {
    fn name(&self) -> &'static str {
        "lnd-blob"
    }

    fn try_decode(&self, file: &ExtractedFile) -> Result<Option<ExtractedFile>, CodecError> {
        if !file.content.starts_with(codec::LND_MAGIC) {
            return Ok(None);
        }
        let content = codec::decompress_lnd(&file.content)?;
        Ok(Some(ExtractedFile {
            name: file.name.clone(),
            content,
        }))
    }
}
