use std::path::PathBuf;

use cfgpack_archive::CompressionAlgorithm;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cfgpack",
    about = "Build, inspect and verify content-hashed config archives",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CompressionArg {
    None,
    Deflate,
}

impl From<CompressionArg> for CompressionAlgorithm {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => CompressionAlgorithm::None,
            CompressionArg::Deflate => CompressionAlgorithm::Deflate,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Show archive header and entries
    Inspect(InspectArgs),
    /// Check entry hashes and the archive version
    Verify(VerifyArgs),
    /// Build a binary archive from an archive folder
    Pack(PackArgs),
    /// Extract a binary archive into an archive folder
    Unpack(UnpackArgs),
    /// Print the content hash of files
    Hash(HashArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub archive: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Binary archive or archive folder
    pub path: PathBuf,
}

#[derive(Args)]
pub struct PackArgs {
    pub folder: PathBuf,
    pub output: PathBuf,
    /// TOML file with archive settings
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub compression: Option<CompressionArg>,
    /// Payloads of this many bytes or fewer are stored uncompressed
    #[arg(long)]
    pub min_size: Option<usize>,
}

#[derive(Args)]
pub struct UnpackArgs {
    pub archive: PathBuf,
    pub folder: PathBuf,
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
