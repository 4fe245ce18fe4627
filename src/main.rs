use clap::{Parser, Subcommand};
use imgplex::assemble::DirEmitter;
use imgplex::cache::{CacheStats, VariantCache};
use imgplex::config::{self, EmitMode};
use imgplex::imaging::RustBackend;
use imgplex::options::{OutputRef, parse_outputs};
use imgplex::output::{self, SourceResults};
use imgplex::pipeline::Pipeline;
use imgplex::source::{SourceImage, collect_sources};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Name of the results file written next to emitted variants.
const RESULTS_FILENAME: &str = "variants.json";

/// Shared flags for commands that take source images.
#[derive(clap::Args, Clone)]
struct SourceArgs {
    /// Image file, or directory searched recursively for images
    input: PathBuf,

    /// Outputs to produce, as JSON: a preset name, a spec object, or a list
    /// of either. Overrides `default_outputs` from the config.
    #[arg(long)]
    outputs: Option<String>,
}

#[derive(Parser)]
#[command(name = "imgplex")]
#[command(about = "Expand source images into cached, multiplexed variants")]
#[command(long_about = "\
Expand source images into cached, multiplexed variants

Each output spec lists values per property; every combination becomes one
variant:

  {\"width\": [320, 640], \"format\": [\"webp\", \"jpeg\"]}   → 4 variants

Properties: name, scale, blur, width, height, mode, format, inline.
Presets in imgplex.toml are referenced by name. Files named like
icon@2x.png are treated as 2x density sources.

Run 'imgplex gen-config' to generate a documented imgplex.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// More log output (-v info, -vv debug). IMGPLEX_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce variants and write them with a variants.json result list
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,

        /// Disable the variant cache and transform every variant
        #[arg(long)]
        no_cache: bool,

        /// Override the config's emit mode
        #[arg(long, value_enum)]
        emit: Option<EmitMode>,
    },
    /// Show the variants each source would produce, without transforming
    Plan(SourceArgs),
    /// Print a stock imgplex.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build {
            source,
            output,
            no_cache,
            emit,
        } => {
            let mut config = config::load_config(&cli.config)?;
            if let Some(emit) = emit {
                config.emit = emit;
            }
            let outputs = parse_outputs_arg(source.outputs.as_deref())?;
            let sources = find_sources(&source.input, Some(output.as_path()))?;
            init_thread_pool(&config.processing);

            let backend = RustBackend::new();
            let emitter = DirEmitter::new(&output);
            let cache = if no_cache {
                VariantCache::disabled()
            } else {
                VariantCache::new(config.cache_dir())
            };
            if let Some(dir) = cache.dir() {
                debug!(dir = %dir.display(), "variant cache enabled");
            }
            let pipeline = Pipeline::new(&config, &backend)
                .with_cache(cache)
                .with_emitter(&emitter);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });

            let mut names = Vec::with_capacity(sources.len());
            let mut produced = Vec::with_capacity(sources.len());
            let mut stats = CacheStats::default();
            let result = (|| -> Result<(), Box<dyn std::error::Error>> {
                for path in &sources {
                    let image = SourceImage::open(path)?;
                    let out = pipeline.run(&image, outputs.as_deref(), Some(&tx))?;
                    stats += out.stats;
                    names.push(path.display().to_string());
                    produced.push(out.results);
                }
                Ok(())
            })();
            drop(tx);
            printer.join().ok();
            result?;

            let reports: Vec<SourceResults<'_>> = names
                .iter()
                .zip(&produced)
                .map(|(name, variants)| SourceResults {
                    source: name,
                    variants,
                })
                .collect();
            std::fs::create_dir_all(&output)?;
            let results_path = output.join(RESULTS_FILENAME);
            std::fs::write(&results_path, output::results_json(&reports)?)?;
            println!("Variants: {}", stats);
            println!("==> Results: {}", results_path.display());
        }
        Command::Plan(source) => {
            let config = config::load_config(&cli.config)?;
            let outputs = parse_outputs_arg(source.outputs.as_deref())?;
            let backend = RustBackend::new();
            let pipeline = Pipeline::new(&config, &backend).with_cache(VariantCache::disabled());
            for path in find_sources(&source.input, None)? {
                let image = SourceImage::open(&path)?;
                let (meta, records) = pipeline.plan(&image, outputs.as_deref())?;
                for line in output::format_plan(&path.display().to_string(), &meta, &records) {
                    println!("{}", line);
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `IMGPLEX_LOG`, then `RUST_LOG`, then `-v`.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env("IMGPLEX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| match verbose {
            0 => EnvFilter::new("imgplex=warn"),
            1 => EnvFilter::new("imgplex=info"),
            _ => EnvFilter::new("imgplex=debug"),
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn parse_outputs_arg(json: Option<&str>) -> Result<Option<Vec<OutputRef>>, serde_json::Error> {
    json.map(parse_outputs).transpose()
}

/// Sources under `input`, warning when a directory holds none.
fn find_sources(input: &Path, output: Option<&Path>) -> Result<Vec<PathBuf>, walkdir::Error> {
    let sources = collect_sources(input, output)?;
    if sources.is_empty() {
        warn!(dir = %input.display(), "no source images found");
    }
    Ok(sources)
}
