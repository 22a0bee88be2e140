use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use unlnk::archive::{self, DirSink, ErrorPolicy, ExtractOptions, ExtractedFile, FileSink};
use unlnk::dispatch::DecoderRegistry;

#[derive(Parser)]
#[command(name = "unlnk", about = "Extractor for KID LNK archive containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a file is an LNK container (exit 0 = yes, 1 = no)
    Probe {
        input: PathBuf,
    },
    /// List archive contents
    List {
        input: PathBuf,
        /// Decode each entry and show its CRC32 and leading signature bytes
        #[arg(short, long)]
        checksum: bool,
        /// Emit the listing as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Show container-level metadata
    Info {
        input: PathBuf,
    },
    /// Extract an archive
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Abort on the first bad entry instead of skipping it
        #[arg(long)]
        strict: bool,
        /// Skip sub-decoders; write entry bytes exactly as stored
        #[arg(long)]
        raw: bool,
        /// Refuse entries whose decoded output exceeds this many bytes
        #[arg(long)]
        max_output_bytes: Option<u64>,
    },
}

#[derive(Serialize)]
struct EntryListing<'a> {
    name:       &'a str,
    size:       u32,
    compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    crc32: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match Cli::parse().command {
        // ── Probe ────────────────────────────────────────────────────────────
        Commands::Probe { input } => {
            let data = std::fs::read(&input)?;
            if archive::recognize(&data) {
                println!("{}: LNK container", input.display());
            } else {
                println!("{}: not an LNK container", input.display());
                std::process::exit(1);
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, checksum, json } => {
            let data = std::fs::read(&input)?;
            let entries = archive::read_entries(&data)?;
            let opts = ExtractOptions::default();

            let listings: Vec<EntryListing> = entries
                .iter()
                .map(|entry| {
                    let (crc32, signature) = if checksum {
                        match archive::read_entry(&data, entry, &opts) {
                            Ok(file) => {
                                let sig = &file.content[..file.content.len().min(8)];
                                (
                                    Some(format!("{:08x}", crc32fast::hash(&file.content))),
                                    Some(hex::encode(sig)),
                                )
                            }
                            Err(_) => (Some("corrupt".into()), None),
                        }
                    } else {
                        (None, None)
                    };
                    EntryListing {
                        name: &entry.name,
                        size: entry.size,
                        compressed: entry.compressed,
                        crc32,
                        signature,
                    }
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&listings)?);
            } else {
                println!("{:<24} {:>10}  C  {:<8}  Signature", "Name", "Size", "CRC32");
                for l in &listings {
                    println!(
                        "{:<24} {:>10}  {}  {:<8}  {}",
                        l.name,
                        l.size,
                        if l.compressed { "*" } else { " " },
                        l.crc32.as_deref().unwrap_or(""),
                        l.signature.as_deref().unwrap_or(""),
                    );
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let data = std::fs::read(&input)?;
            let entries = archive::read_entries(&data)?;
            let table_end = 16 + entries.len() * unlnk::table::RECORD_SIZE;
            let stored: u64 = entries.iter().map(|e| u64::from(e.size)).sum();
            let compressed = entries.iter().filter(|e| e.compressed).count();

            println!("── LNK container ────────────────────────────────────────");
            println!("  Path             {}", input.display());
            println!("  Container size   {} B", data.len());
            println!("  Entries          {}", entries.len());
            println!("  Compressed       {}", compressed);
            println!("  Table region     16..{table_end}");
            println!("  Payload region   {}..{}", table_end, data.len());
            println!("  Stored payload   {stored} B");
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, strict, raw, max_output_bytes } => {
            let data = std::fs::read(&input)?;
            let opts = ExtractOptions {
                on_entry_error: if strict { ErrorPolicy::Abort } else { ErrorPolicy::Skip },
                max_entries: None,
                max_output_bytes,
                registry: if raw {
                    DecoderRegistry::empty()
                } else {
                    DecoderRegistry::with_builtin()
                },
            };

            let mut sink = VerboseSink(DirSink::new(&output_dir)?);
            let report = archive::extract(&data, &mut sink, &opts)?;

            for skipped in &report.skipped {
                eprintln!("  skipped {}  ({})", skipped.name, skipped.error);
            }
            println!(
                "Extracted {} file(s) to {} ({} skipped)",
                report.extracted,
                output_dir.display(),
                report.skipped.len(),
            );
        }
    }

    Ok(())
}

/// Prints a line per saved file on the way into the wrapped sink.
struct VerboseSink<S: FileSink>(S);

impl<S: FileSink> FileSink for VerboseSink<S> {
    fn save(&mut self, file: ExtractedFile) -> std::io::Result<()> {
        println!("  unpacked  {}  ({} B)", file.name, file.content.len());
        self.0.save(file)
    }
}
