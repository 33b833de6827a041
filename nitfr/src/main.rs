use libnitf::Dialect;
use nitfr::{describe, image_to_nitf, nitf_to_image, rewrite};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Version {
    /// NITF 02.00
    Nitf20,
    /// NITF 02.10
    Nitf21,
    /// NSIF 01.00
    Nsif10,
}

impl From<Version> for Dialect {
    fn from(value: Version) -> Self {
        match value {
            Version::Nitf20 => Self::Nitf20,
            Version::Nitf21 => Self::Nitf21,
            Version::Nsif10 => Self::Nsif10,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// prints the headers and TREs of a NITF/NSIF file
    Info {
        nitf_file: PathBuf,
        /// Show every TRE as raw bytes
        #[arg(long)]
        opaque: bool,
    },

    /// parses a NITF/NSIF file and writes it back
    Rewrite {
        nitf_file: PathBuf,
        /// The output file name
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep every TRE as raw bytes
        #[arg(long)]
        opaque: bool,
    },

    /// converts an image segment to a PNG image
    #[command(name = "nitfimg")]
    NitfToImage {
        nitf_file: PathBuf,
        /// Index of the image segment
        #[arg(short, long, default_value_t = 0)]
        segment: usize,
        /// The output file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// wraps an image into a NITF/NSIF file
    #[command(name = "imgnitf")]
    ImageToNitf {
        img_file: PathBuf,
        /// The output file name
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Format version to write
        #[arg(short, long, value_enum, default_value_t = Version::Nitf21)]
        dialect: Version,
    },
}

/// `<dir>/<stem><suffix>` next to `input`
fn output_name(input: &Path, suffix: &str) -> Result<PathBuf> {
    let Some(dir) = input.parent() else {
        bail!("Invalid input file {}", input.display());
    };
    let Some(Some(filename)) = input.file_stem().map(|os| os.to_str()) else {
        bail!("Invalid input file {}", input.display());
    };
    let output = dir.join(format!("{filename}{suffix}"));
    info!("output name: {}", output.display());
    Ok(output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .init();

    match cli.command {
        Commands::Info { nitf_file, opaque } => describe(&nitf_file, !opaque)?,
        Commands::Rewrite {
            nitf_file,
            output,
            opaque,
        } => {
            let output = match output {
                Some(o) => o,
                None => output_name(&nitf_file, ".rewritten.ntf")?,
            };
            rewrite(&nitf_file, &output, !opaque)?;
        }
        Commands::NitfToImage {
            nitf_file,
            segment,
            output,
        } => {
            let output = match output {
                Some(o) => o,
                None => output_name(&nitf_file, ".png")?,
            };
            nitf_to_image(&nitf_file, segment, &output)?;
        }
        Commands::ImageToNitf {
            img_file,
            output,
            dialect,
        } => {
            let output = match output {
                Some(o) => o,
                None => output_name(&img_file, ".ntf")?,
            };
            image_to_nitf(&img_file, &output, dialect.into())?;
        }
    }
    Ok(())
}
