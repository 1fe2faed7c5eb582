use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tensorcask::pipeline::{CodecId, Dtype, PrevState};
use tensorcask::reader::Reader;
use tensorcask::workspace::Workspace;
use tensorcask::writer::{Writer, WriterOptions};

#[derive(Parser)]
#[command(name = "tensorcask", version = "1.0.0", about = "tensorcask container CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty container
    Create {
        output: PathBuf,
        /// Chunks per index block before it rolls over
        #[arg(long, default_value = "1024")]
        index_block_capacity: u32,
    },
    /// Encode a raw binary file and append it as one chunk
    Append {
        container: PathBuf,
        /// File containing raw (decoded) payload bytes
        #[arg(short, long)]
        input: PathBuf,
        /// Codec name: raw, entropy-only, t1d-f32-xor-shuffle, t1d-i64-delta,
        /// t2d-f32, ob-generic-f32, ... (see --help for the full list)
        #[arg(short, long, default_value = "raw")]
        codec: String,
        /// Dtype name: u8, i8, u16, i16, u32, i32, u64, i64, f32, f16, bf16, f64
        #[arg(short, long, default_value = "u8")]
        dtype: String,
        /// Comma-separated shape, e.g. "1000" or "64,8"
        #[arg(short, long)]
        shape: String,
        #[arg(short, long, default_value = "3")]
        level: i32,
    },
    /// Show header metadata and chunk count
    Info { container: PathBuf },
    /// List every chunk's shape/dtype/codec/size
    List { container: PathBuf },
    /// Decode one chunk and write its raw bytes to stdout or a file
    DumpChunk {
        container: PathBuf,
        index: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode every chunk and verify its hash, failing on the first mismatch
    Verify { container: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Create { output, index_block_capacity } => {
            let options = WriterOptions { index_block_capacity, ..Default::default() };
            let writer = Writer::create_file(&output, options)?;
            writer.release_backend()?;
            println!("Created: {}", output.display());
        }

        Commands::Append { container, input, codec, dtype, shape, level } => {
            let codec_id = parse_codec(&codec)?;
            let dtype_id = parse_dtype(&dtype)?;
            let shape: Vec<u32> = shape
                .split(',')
                .map(|s| s.trim().parse::<u32>())
                .collect::<Result<_, _>>()
                .map_err(|e| format!("invalid --shape: {e}"))?;

            let raw = std::fs::read(&input)?;
            let mut writer = Writer::open_file_for_append(&container)?;
            let mut state = PrevState::None;
            let mut workspace = Workspace::new();
            let detail = tensorcask::ops::store_chunk(
                &mut writer, codec_id, dtype_id, &shape, &raw, &mut state, &mut workspace, level,
            )?;
            writer.flush()?;
            println!(
                "Appended chunk {}  ({} B -> {} B)",
                detail.index, detail.original_size, detail.compressed_size
            );
        }

        Commands::Info { container } => {
            let mut reader = Reader::open_file(&container)?;
            let header = reader.file_header();
            println!("── tensorcask container ─────────────────────────────────");
            println!("  Path            {}", container.display());
            println!("  Chunks          {}", reader.num_chunks());
            println!("  User metadata   {} B", header.user_metadata.len());
        }

        Commands::List { container } => {
            let mut reader = Reader::open_file(&container)?;
            let report = tensorcask::ops::inspect(&mut reader)?;
            println!(
                "{:<6} {:<12} {:<24} {:<22} {:>14} {:>14}  Hash (first 8 bytes)",
                "Index", "Dtype", "Codec", "Shape", "Encoded B", "Decoded B"
            );
            for summary in &report.chunk_summaries {
                println!(
                    "{:<6} {:<12} {:<24} {:<22} {:>14} {:>14}  {}",
                    summary.index,
                    format!("{:?}", summary.dtype),
                    format!("{:?}", summary.codec),
                    format!("{:?}", summary.shape),
                    summary.encoded_size_bytes,
                    summary.decoded_size_bytes,
                    hex::encode(&summary.hash[..8]),
                );
            }
        }

        Commands::DumpChunk { container, index, output } => {
            let reader = Reader::open_file(&container)?;
            let mut extractor = tensorcask::extractor::Extractor::new(reader);
            let decoded = extractor.read_chunk_stateless(index)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &decoded)?;
                    println!("Wrote {} B to {}", decoded.len(), path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&decoded)?;
                }
            }
        }

        Commands::Verify { container } => {
            let reader = Reader::open_file(&container)?;
            let num_chunks = reader.num_chunks();
            let mut extractor = tensorcask::extractor::Extractor::new(reader);
            for i in 0..num_chunks {
                extractor.read_chunk(i)?;
            }
            println!("Verified {num_chunks} chunk(s): all hashes match");
        }
    }

    Ok(())
}

fn parse_codec(s: &str) -> Result<CodecId, Box<dyn std::error::Error>> {
    Ok(match s {
        "raw" => CodecId::Raw,
        "entropy-only" => CodecId::EntropyOnly,
        "t1d-f32-xor-shuffle" => CodecId::T1dF32XorShuffle,
        "t1d-f16-xor-shuffle-from-f32" => CodecId::T1dF16XorShuffleFromF32,
        "t1d-i64-xor" => CodecId::T1dI64Xor,
        "t1d-i64-delta" => CodecId::T1dI64Delta,
        "t2d-f32" => CodecId::T2dF32,
        "t2d-f16-from-f32" => CodecId::T2dF16FromF32,
        "t2d-i64" => CodecId::T2dI64,
        "ob-okx-f32" => CodecId::ObOkxF32,
        "ob-okx-f16" => CodecId::ObOkxF16,
        "ob-binance-f32" => CodecId::ObBinanceF32,
        "ob-binance-f16" => CodecId::ObBinanceF16,
        "ob-generic-f32" => CodecId::ObGenericF32,
        "ob-generic-f16" => CodecId::ObGenericF16,
        other => return Err(format!("unknown codec '{other}'").into()),
    })
}

fn parse_dtype(s: &str) -> Result<Dtype, Box<dyn std::error::Error>> {
    Ok(match s {
        "u8" => Dtype::U8,
        "i8" => Dtype::I8,
        "u16" => Dtype::U16,
        "i16" => Dtype::I16,
        "u32" => Dtype::U32,
        "i32" => Dtype::I32,
        "u64" => Dtype::U64,
        "i64" => Dtype::I64,
        "f32" => Dtype::F32,
        "f16" => Dtype::F16,
        "bf16" => Dtype::Bf16,
        "f64" => Dtype::F64,
        other => return Err(format!("unknown dtype '{other}'").into()),
    })
}
