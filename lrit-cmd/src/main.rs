mod assemble;
mod info;

#[cfg(test)]
#[path = "../../lrit-lib/tests/common/mod.rs"]
mod segment_fixtures;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header records of LRIT files.
    Info {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,

        /// Input LRIT files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Assemble segmented LRIT image files into PNG images.
    ///
    /// Segments are grouped into images by spacecraft, channel, and time stamp. Each
    /// finished image is written as <id>.png along with a <id>.json containing the
    /// product metadata. Images missing segments are written as <id>_partial.png.
    ///
    /// Only uncompressed 8-bit image data is supported.
    Assemble {
        /// Only assemble these channels or channel ranges.
        ///
        /// This accepts a CSV of channels as well as ranges of the format <start>-<end>
        /// where start and end are inclusive. For example, --channels 1,2,3,9 or
        /// --channels 1-3,9
        #[arg(short, long, value_name = "csv", value_delimiter = ',')]
        channels: Vec<String>,

        /// Do not write images that are missing segments.
        #[arg(long, action)]
        no_partial: bool,

        /// Satellite name recorded in the product metadata.
        #[arg(long, default_value = "")]
        satellite_name: String,

        /// Short satellite name recorded in the product metadata.
        #[arg(long, default_value = "")]
        satellite_short_name: String,

        /// Overwrite existing output files.
        #[arg(long, action)]
        clobber: bool,

        /// Output directory.
        #[arg(short, long, default_value = ".", value_name = "path")]
        output: PathBuf,

        /// Input LRIT files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn parse_number_ranges(list: &[String]) -> Result<Vec<u32>> {
    let rx = regex::Regex::new(r"^(?:(\d+)|(\d+)-(\d+))$").expect("regex to compile");
    let mut values = Vec::default();
    for (i, s) in list.iter().enumerate() {
        let Some(cap) = rx.captures(s.trim()) else {
            bail!("invalid number or range {s:?}");
        };

        if cap.get(1).is_some() {
            let x = cap[1]
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid number value at {i}"))?;
            values.push(x);
        } else {
            let start = cap[2]
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid range value at {i}"))?;
            let end = cap[3]
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid range value at {i}"))?;
            if start > end {
                bail!("invalid range {s:?}")
            }
            values.extend(start..=end);
        }
    }

    Ok(values)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("LRIT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Info { format, inputs } => info::info(inputs, format),
        Commands::Assemble {
            channels,
            no_partial,
            satellite_name,
            satellite_short_name,
            clobber,
            output,
            inputs,
        } => {
            let channels = parse_number_ranges(channels)?
                .into_iter()
                .map(|v| u8::try_from(v).map_err(|_| anyhow!("invalid channel {v}")))
                .collect::<Result<Vec<u8>>>()?;
            debug!("channels: {channels:?}");

            let opts = assemble::Opts {
                channels,
                emit_partial: !no_partial,
                satellite_name: satellite_name.clone(),
                satellite_short_name: satellite_short_name.clone(),
                clobber: *clobber,
            };
            assemble::assemble(inputs, output, &opts)
        }
    }
}
