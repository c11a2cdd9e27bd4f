mod wav;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use nas_codecs::{codec_by_tag, ZlibCodec};
use nas_core::format::tag_str;
use nas_core::{encode_file, EncoderConfig, Reader};

use crate::wav::{read_wav, Dtype};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "nas",
    about = "Encode multichannel audio into NAS block-delta containers and inspect them",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a WAV file into a NAS container
    Encode {
        /// Source WAV file
        input: PathBuf,
        /// Destination NAS file
        #[arg(default_value = "OUT.NAS")]
        output: PathBuf,
        /// Append the CHKS chunk of per-block diagnostic values
        #[arg(long)]
        checksum: bool,
        /// Sample element type to read the WAV as
        #[arg(long, value_enum, default_value_t = Dtype::Float64)]
        dtype: Dtype,
        /// Fail before writing anything if the element type cannot be block-encoded
        #[arg(long)]
        strict_types: bool,
    },
    /// Print header fields, chunk layout and payload statistics
    Inspect {
        /// NAS file to inspect
        file: PathBuf,
        /// Print the per-block checksum values
        #[arg(long)]
        checksums: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_encode(
    input: PathBuf,
    output: PathBuf,
    checksum: bool,
    dtype: Dtype,
    strict_types: bool,
) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let (matrix, sample_rate) = read_wav(&input, dtype)?;
    let source_bytes = (matrix.buffer().len() * matrix.element_type().size_bytes()) as u64;

    let config = EncoderConfig {
        checksum,
        strict_types,
    };
    let report = encode_file(&output, matrix, sample_rate, Box::new(ZlibCodec), config)
        .with_context(|| format!("encoding into {:?}", output))?;
    let elapsed = t0.elapsed();

    eprintln!("  sample type : {} (tag {})", report.element_type, report.type_tag);
    eprintln!("  channels    : {}", report.channels);
    eprintln!("  frames      : {}", report.frames);
    eprintln!("  sample rate : {} Hz", report.sample_rate);
    eprintln!("  blocks      : {}", report.stats.total());
    eprintln!("    compressed: {}", report.stats.compressed);
    eprintln!("    repeated  : {}", report.stats.repeated);
    eprintln!("    raw       : {}", report.stats.raw);
    eprintln!("  source size : {}", human_bytes(source_bytes));
    eprintln!("  block data  : {}", human_bytes(report.payload_len));
    eprintln!(
        "  {:<11} : {}",
        tag_str(&report.codec_tag).trim_end(),
        human_bytes(report.compressed_len)
    );
    eprintln!("  file size   : {}", human_bytes(report.file_size));
    if report.file_size > 0 {
        eprintln!(
            "  ratio       : {:.2}x",
            source_bytes as f64 / report.file_size as f64
        );
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_checksums: bool) -> anyhow::Result<()> {
    let reader = Reader::open(&file).with_context(|| format!("opening {:?}", file))?;
    let header = reader.header();
    let pointers = reader.pointers();
    let file_size = std::fs::metadata(&file)?.len();

    let codec = codec_by_tag(reader.codec_tag())?;
    let payload = reader.payload(codec.as_ref())?;

    println!("=== NAS File: {:?} ===", file);
    println!();
    println!("  type tag       : {}", header.type_tag);
    println!(
        "  channels       : {} (descriptor 0x{:02x}{})",
        header.channels.count(),
        header.channels.0,
        if header.channels.is_extended() { ", extended" } else { "" }
    );
    println!("  frames         : {}", header.frames);
    println!("  block size     : {} samples", header.block_size);
    if header.channels.is_extended() {
        println!("  blocks (est.)  : unknown (extended channel descriptor)");
    } else {
        println!("  blocks (est.)  : {}", reader.expected_blocks());
    }
    println!("  header pointer : {}", pointers.header_ptr);
    println!("  chks pointer   : {}", pointers.checksum_ptr);
    println!("  data chunk     : offset {}", reader.data_offset());
    println!("  codec          : {} ({})", codec.name(), tag_str(&reader.codec_tag()));
    println!("  block data     : {}", human_bytes(payload.len() as u64));
    println!("  compressed     : {}", human_bytes(reader.compressed_payload().len() as u64));
    println!("  file on disk   : {}", human_bytes(file_size));

    match reader.checksum_chunk() {
        Some(chunk) => {
            println!(
                "  checksum chunk : offset {}, end {}, {} values",
                chunk.offset,
                chunk.end,
                chunk.values.len()
            );
            if show_checksums {
                println!();
                println!("  {:>8}  {:>20}", "block", "value");
                println!("  {}", "-".repeat(30));
                for (i, v) in chunk.values.iter().enumerate() {
                    println!("  {:>8}  {:>20}", i, v);
                }
            }
        }
        None => println!("  checksum chunk : none"),
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Encode {
            input,
            output,
            checksum,
            dtype,
            strict_types,
        } => run_encode(input, output, checksum, dtype, strict_types),
        Commands::Inspect { file, checksums } => run_inspect(file, checksums),
    }
}
