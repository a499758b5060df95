use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use nanostream::frame::{psnr, FrameCodec};
use nanostream::training::{fit_basis, FitConfig};
use nanostream::{decode_file, encode_file, ppm, BasisTable, TileCodec};

#[derive(Parser, Debug)]
#[command(name = "nanostream")]
#[command(version)]
#[command(about = "Fixed-rate PCA tile codec for RGB8 images", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a PPM image into a tile stream
    Encode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Decode a tile stream into a PPM image
    Decode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Encode and decode every tile of an image and report PSNR
    Roundtrip {
        input: PathBuf,
        #[arg(default_value = "result.ppm")]
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Fit a basis table to a set of PPM images
    Train {
        output: PathBuf,
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Blocks sampled per image
        #[arg(long, default_value = "1024")]
        samples: usize,
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(clap::Args, Debug)]
struct CodecArgs {
    /// Basis table file (defaults to the built-in table)
    #[arg(long)]
    basis: Option<PathBuf>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,
}

impl CodecArgs {
    fn frame_codec(&self) -> nanostream::Result<FrameCodec> {
        let basis = match &self.basis {
            Some(path) => BasisTable::load(path)?,
            None => BasisTable::builtin(),
        };
        Ok(FrameCodec::new(TileCodec::new(basis), self.threads))
    }
}

fn create_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                error!("Error creating output directory: {}", e);
                process::exit(1);
            });
        }
    }
}

fn run(command: Command) -> nanostream::Result<()> {
    match command {
        Command::Encode { input, output, codec } => {
            create_parent_dir(&output);
            encode_file(&codec.frame_codec()?, &input, &output)?;
        }
        Command::Decode { input, output, codec } => {
            create_parent_dir(&output);
            decode_file(&codec.frame_codec()?, &input, &output)?;
        }
        Command::Roundtrip { input, output, codec } => {
            create_parent_dir(&output);
            let frame = codec.frame_codec()?;
            let image = ppm::open(&input)?;

            let decoded = frame.roundtrip(&image)?;
            if decoded.width() != image.width() || decoded.height() != image.height() {
                warn!(
                    "image size ({}x{}) is not divisible into tile size ({}x{})",
                    image.width(),
                    image.height(),
                    nanostream::TILE_WIDTH,
                    nanostream::TILE_HEIGHT
                );
            }

            ppm::save(&decoded, &output, true)?;
            info!("PSNR: {:.2} dB", psnr(&image, &decoded));
        }
        Command::Train {
            output,
            images,
            samples,
            seed,
        } => {
            create_parent_dir(&output);
            let images = images
                .iter()
                .map(ppm::open)
                .collect::<nanostream::Result<Vec<_>>>()?;

            let config = FitConfig {
                samples_per_image: samples,
                seed,
            };
            let basis = fit_basis(&images, &config)?;
            basis.save(&output)?;
            info!("Saved basis table to: {}", output.display());
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(args.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing logger: {}", e);
    }

    if let Err(e) = run(args.command) {
        error!("{}", e);
        process::exit(1);
    }
}
