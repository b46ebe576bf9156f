use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgEnum, Parser, Subcommand};
use located_error::prelude::*;
use thiserror::Error;

use sav::{BoundingPoint, Reader, SavError, Writer};

#[macro_use]
extern crate log;

#[derive(Parser, Debug)]
#[clap(name = "sav", author, version, about = "Inspect, query and index SAV variant files", long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Set the verbosity level (-v -vv -vvv)
    #[clap(short = 'v', long, parse(from_occurrences), global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream decoded records to stdout, optionally restricted to a region and/or sample subset.
    View {
        file: PathBuf,
        /// `CHROM:FROM-TO`, one-based and inclusive.
        #[clap(long)]
        region: Option<String>,
        #[clap(long, arg_enum, default_value = "any")]
        bounding_point: BoundingPointArg,
        /// Comma-separated sample names; restricts every FORMAT vector to these samples.
        #[clap(long, use_value_delimiter = true)]
        samples: Vec<String>,
    },
    /// Rebuild the `.s1r` sidecar (and, with it, the record framing) of an existing SAV file.
    Index { file: PathBuf },
    /// Print record/sample counts and the S1R index block size.
    Stat { file: PathBuf },
}

#[derive(Debug, Clone, Copy, ArgEnum)]
enum BoundingPointArg {
    Any,
    All,
    Beg,
    End,
}

impl From<BoundingPointArg> for BoundingPoint {
    fn from(arg: BoundingPointArg) -> Self {
        match arg {
            BoundingPointArg::Any => BoundingPoint::Any,
            BoundingPointArg::All => BoundingPoint::All,
            BoundingPointArg::Beg => BoundingPoint::Beg,
            BoundingPointArg::End => BoundingPoint::End,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Arg(String),

    #[error(transparent)]
    Sav(#[from] SavError),
}

/// Checked before opening any file: produces a plain argument-level error
/// with file:line:column context rather than bubbling an I/O error that
/// would be mapped to the wrong exit code.
fn check_readable(path: &Path) -> Result<(), CliError> {
    std::fs::metadata(path)
        .with_loc(|| format!("file {path:?} does not exist or is not readable"))
        .map_err(|e| CliError::Arg(e.to_string()))?;
    Ok(())
}

fn parse_region(spec: &str) -> Result<(String, u64, u64), CliError> {
    let (chrom, range) = spec
        .split_once(':')
        .ok_or_else(|| CliError::Arg(format!("--region {spec:?} is missing a ':' separator")))?;
    let (from, to) = range
        .split_once('-')
        .ok_or_else(|| CliError::Arg(format!("--region {spec:?} is missing a '-' separator in its range")))?;
    let from: u64 = from.parse().map_err(|_| CliError::Arg(format!("--region {spec:?} has a non-numeric start")))?;
    let to: u64 = to.parse().map_err(|_| CliError::Arg(format!("--region {spec:?} has a non-numeric end")))?;
    Ok((chrom.to_string(), from, to))
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::View { file, region, bounding_point, samples } => {
            check_readable(&file)?;
            let mut reader = Reader::open(&file)?;
            if !samples.is_empty() {
                let names: Vec<&str> = samples.iter().map(String::as_str).collect();
                reader.subset_samples(&names)?;
            }
            if let Some(region) = region {
                let (chrom, begin, end) = parse_region(&region)?;
                reader.reset_bounds(&chrom, begin, end, bounding_point.into())?;
            }
            loop {
                match reader.read()? {
                    sav::ReadOutcome::Delivered(variant) => {
                        let chrom_name = reader
                            .dictionary()
                            .contig
                            .resolve(variant.site.chrom_code as u32)
                            .map(|entry| entry.name.as_str())
                            .unwrap_or("?");
                        let alts: Vec<String> =
                            variant.site.alts.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect();
                        println!(
                            "{chrom_name}\t{}\t{}\t{}",
                            variant.site.pos_one_based(),
                            String::from_utf8_lossy(&variant.site.reference),
                            alts.join(",")
                        );
                    }
                    sav::ReadOutcome::Eof => break,
                }
            }
            if !reader.good() {
                warn!("reader reported a non-good state after streaming {file:?}");
            }
            Ok(())
        }
        Command::Index { file } => {
            check_readable(&file)?;
            let mut reader = Reader::open(&file)?;
            let header = reader.header.clone();
            let tmp = file.with_extension("sav.reindex");
            let mut writer = Writer::create(&tmp, &header)?;
            loop {
                match reader.read()? {
                    sav::ReadOutcome::Delivered(variant) => {
                        let chrom_name = reader
                            .dictionary()
                            .contig
                            .resolve(variant.site.chrom_code as u32)
                            .map(|entry| entry.name.as_str())
                            .unwrap_or("");
                        writer.write_record(chrom_name, &variant.site, &variant.format)?;
                    }
                    sav::ReadOutcome::Eof => break,
                }
            }
            writer.finish()?;
            std::fs::rename(&tmp, &file).map_err(SavError::from)?;
            let mut sidecar_tmp = tmp.into_os_string();
            sidecar_tmp.push(".s1r");
            let mut sidecar_dst = file.clone().into_os_string();
            sidecar_dst.push(".s1r");
            std::fs::rename(sidecar_tmp, sidecar_dst).map_err(SavError::from)?;
            info!("rebuilt index for {file:?}");
            Ok(())
        }
        Command::Stat { file } => {
            check_readable(&file)?;
            let mut reader = Reader::open(&file)?;
            let mut records = 0u64;
            while matches!(reader.read()?, sav::ReadOutcome::Delivered(_)) {
                records += 1;
            }
            println!("records: {records}");
            println!("samples: {}", reader.header.samples.len());
            match reader.index_block_size() {
                Some(size) => println!("index block size: {size} bytes"),
                None => println!("index block size: (no .s1r sidecar found)"),
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logger::Logger::init(cli.verbose);

    if let Err(err) = run(cli.command) {
        error!("{err}");
        let code = match err {
            CliError::Arg(_) => 1,
            CliError::Sav(SavError::Io(_)) => 2,
            CliError::Sav(_) => 3,
        };
        process::exit(code);
    }
}
