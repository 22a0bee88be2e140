pub mod archive;
pub mod codec;
pub mod dispatch;
pub mod io_stream;
pub mod obfuscate;
pub mod table;

pub use archive::{
    extract, read_entries, read_entry, recognize, DirSink, ErrorPolicy, ExtractError,
    ExtractOptions, ExtractReport, ExtractedFile, FileSink, VecSink,
};
pub use codec::{compress_lnd, decompress_lnd};
pub use dispatch::{DecoderRegistry, SubDecoder};
pub use table::TableEntry;
