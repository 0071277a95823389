use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arbor_bvh::{RenderBuffers, build_bvh, skeleton_obj};
use arbor_core::{RandomTreeConfig, Segment, random_branching};
use arbor_grammar::{Grammar, HybridConfig, PresetLibrary, RewriteConfig, generate_seeded};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

type DynError = Box<dyn Error>;

const DEFAULT_ALPHA: f64 = 0.5;

#[derive(Debug, Parser)]
#[command(name = "arbor", version)]
#[command(about = "Grow parametric branch structures and index them for raymarching")]
struct Cli {
    /// Tracing filter used when RUST_LOG is unset
    #[arg(long, global = true, env = "ARBOR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct PresetSource {
    /// JSON preset file; the built-in species are used when omitted
    #[arg(long, env = "ARBOR_PRESETS_FILE")]
    presets_file: Option<PathBuf>,

    /// Give presets without variation ranges the default organic ranges
    #[arg(long)]
    inject_variation: bool,
}

#[derive(Debug, clap::Args)]
struct GrowArgs {
    /// Preset name
    #[arg(long, short)]
    preset: String,

    /// RNG seed; drawn from entropy and logged when omitted
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    source: PresetSource,

    /// Expansion stops with an error past this many symbols
    #[arg(long, default_value_t = RewriteConfig::default().max_symbols)]
    max_symbols: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Segment list as JSON
    Json,
    /// Line skeleton as Wavefront OBJ
    Obj,
    /// Renderer buffers: three u32 counts then segments, nodes, leaf indices
    Gpu,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List preset names
    Presets {
        /// Print the full library as a preset file instead
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        source: PresetSource,
    },
    /// Print a preset's knobs and rules
    Describe {
        name: String,
        #[command(flatten)]
        source: PresetSource,
    },
    /// Generate a structure from a preset
    Generate {
        #[command(flatten)]
        grow: GrowArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Output path; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate a structure and report spatial index statistics
    Index {
        #[command(flatten)]
        grow: GrowArgs,
    },
    /// Crossbreed two presets, or a random pair when both are omitted
    Hybridize {
        #[arg(long)]
        a: Option<String>,
        #[arg(long)]
        b: Option<String>,
        /// Weight of the second parent (default 0.5); needs --a and --b
        #[arg(long)]
        alpha: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Share of the combined rule pool the offspring keeps
        #[arg(long, default_value_t = HybridConfig::default().rule_retention)]
        retention: f64,
        #[command(flatten)]
        source: PresetSource,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Grow the non-parametric fallback tree
    RandomTree {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = RandomTreeConfig::default().levels)]
        levels: u32,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), DynError> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Presets { json, source } => {
            let library = load_library(&source)?;
            print!("{}", list_presets(&library, json)?);
            Ok(())
        }
        Command::Describe { name, source } => {
            let library = load_library(&source)?;
            println!("{}", library.get(&name)?);
            Ok(())
        }
        Command::Generate {
            grow,
            format,
            output,
        } => {
            let segments = grow_segments(&grow)?;
            let bytes = render(&segments, format)?;
            write_output(output.as_deref(), &bytes)
        }
        Command::Index { grow } => {
            let segments = grow_segments(&grow)?;
            let bvh = build_bvh(&segments);
            let stats = bvh.stats();
            println!("segments      {}", segments.len());
            println!("nodes         {}", stats.nodes);
            println!("leaves        {}", stats.leaves);
            println!("max depth     {}", stats.max_depth);
            println!("max leaf size {}", stats.max_leaf_size);
            if let Some(root) = bvh.root() {
                println!("bounds min    {:?}", root.bounds.min);
                println!("bounds max    {:?}", root.bounds.max);
            }
            Ok(())
        }
        Command::Hybridize {
            a,
            b,
            alpha,
            seed,
            retention,
            source,
            output,
        } => {
            let library = load_library(&source)?;
            let seed = resolve_seed(seed);
            let config = HybridConfig {
                rule_retention: retention,
            };
            let offspring = hybridize(&library, a.as_deref(), b.as_deref(), alpha, &config, seed)?;
            let json = serde_json::to_string_pretty(&offspring)?;
            write_output(output.as_deref(), format!("{json}\n").as_bytes())
        }
        Command::RandomTree {
            seed,
            levels,
            format,
            output,
        } => {
            let seed = resolve_seed(seed);
            let config = RandomTreeConfig {
                levels,
                ..RandomTreeConfig::default()
            };
            let segments = random_branching(&mut StdRng::seed_from_u64(seed), &config);
            info!(seed, segments = segments.len(), "grew random tree");
            let bytes = render(&segments, format)?;
            write_output(output.as_deref(), &bytes)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_library(source: &PresetSource) -> Result<PresetLibrary, DynError> {
    let library = match &source.presets_file {
        Some(path) => PresetLibrary::load(path)?,
        None => PresetLibrary::builtin()?,
    };
    Ok(if source.inject_variation {
        library.with_injected_variation()
    } else {
        library
    })
}

fn list_presets(library: &PresetLibrary, json: bool) -> Result<String, DynError> {
    if json {
        return Ok(format!("{}\n", library.to_json_pretty()?));
    }
    Ok(library.names().map(|name| format!("{name}\n")).collect())
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(rand::random::<u64>);
    info!(seed, "using seed");
    seed
}

fn grow_segments(grow: &GrowArgs) -> Result<Vec<Segment>, DynError> {
    let library = load_library(&grow.source)?;
    let grammar = library.get(&grow.preset)?;
    let seed = resolve_seed(grow.seed);
    let config = RewriteConfig {
        max_symbols: grow.max_symbols,
        ..RewriteConfig::default()
    };
    Ok(generate_seeded(grammar, &config, seed)?.segments)
}

fn hybridize(
    library: &PresetLibrary,
    a: Option<&str>,
    b: Option<&str>,
    alpha: Option<f64>,
    config: &HybridConfig,
    seed: u64,
) -> Result<Grammar, DynError> {
    let mut rng = StdRng::seed_from_u64(seed);
    match (a, b) {
        (Some(a), Some(b)) => {
            let (a, b) = (library.get(a)?, library.get(b)?);
            Ok(config.crossbreed(a, b, alpha.unwrap_or(DEFAULT_ALPHA), &mut rng))
        }
        (None, None) if alpha.is_some() => {
            Err("--alpha applies only to a named pair; pass --a and --b".into())
        }
        (None, None) => Ok(config.random_hybrid(library.grammars(), &mut rng)?),
        _ => Err("pass both --a and --b, or neither for a random pair".into()),
    }
}

fn render(segments: &[Segment], format: OutputFormat) -> Result<Vec<u8>, DynError> {
    Ok(match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_vec_pretty(segments)?;
            json.push(b'\n');
            json
        }
        OutputFormat::Obj => skeleton_obj(segments).into_bytes(),
        OutputFormat::Gpu => RenderBuffers::encode(segments, &build_bvh(segments)).to_bytes(),
    })
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), DynError> {
    match path {
        Some(path) => {
            fs::write(path, bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), "wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
