use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};

use canopy_core::resolve::{EnvResolver, ResolveOptions};
use canopy_core::{Config, ConfigError, RenderOptions, Value};

mod includer;

use includer::FileIncluder;

/// Output format for rendered configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Hocon,
    Json,
    Compact,
}

impl OutputFormat {
    fn render_options(self) -> RenderOptions {
        match self {
            OutputFormat::Hocon => RenderOptions::hocon(),
            OutputFormat::Json => RenderOptions::json(),
            OutputFormat::Compact => RenderOptions::concise(),
        }
    }
}

/// Canopy configuration toolchain.
#[derive(Parser)]
#[command(name = "canopy", version, about = "Canopy configuration toolchain")]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "hocon", value_enum)]
    output: OutputFormat,

    /// Fall back to environment variables for substitutions not found in
    /// the document
    #[arg(long, global = true)]
    use_env: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a config file and report syntax problems
    Check {
        /// Path to the config file
        file: PathBuf,
    },

    /// Parse and fully resolve a config file, then print it
    Resolve {
        /// Path to the config file
        file: PathBuf,
        /// Keep going when substitutions cannot be resolved
        #[arg(long)]
        allow_unresolved: bool,
    },

    /// Resolve a single path lazily and print its value
    Get {
        /// Path to the config file
        file: PathBuf,
        /// Dotted path to look up, e.g. server.port
        path: String,
    },

    /// Print a config file without resolving it
    Render {
        /// Path to the config file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(&cli);
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), ConfigError> {
    match &cli.command {
        Commands::Check { file } => {
            let _ = parse_file(file)?;
            println!("{}: ok", file.display());
            Ok(())
        }
        Commands::Resolve {
            file,
            allow_unresolved,
        } => {
            let config = parse_file(file)?;
            let options = resolve_options(cli).allow_unresolved(*allow_unresolved);
            let resolved = config.resolve_with(&options)?;
            println!("{}", resolved.render(&cli.output.render_options()));
            Ok(())
        }
        Commands::Get { file, path } => {
            let config = parse_file(file)?;
            let value = config.resolve_value_at(path, &resolve_options(cli))?;
            match value {
                Some(v) => {
                    println!("{}", render_value(&v, cli.output));
                    Ok(())
                }
                None => Err(ConfigError::missing(config.root().origin(), path.clone())),
            }
        }
        Commands::Render { file } => {
            let config = parse_file(file)?;
            println!("{}", config.render(&cli.output.render_options()));
            Ok(())
        }
    }
}

fn resolve_options(cli: &Cli) -> ResolveOptions {
    let mut options = ResolveOptions::new();
    if cli.use_env {
        options = options.with_resolver(Rc::new(EnvResolver));
    }
    options
}

fn render_value(value: &Value, output: OutputFormat) -> String {
    canopy_core::render::render(value, &output.render_options())
}

fn parse_file(file: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(file).map_err(|e| ConfigError::Include {
        name: file.display().to_string(),
        message: e.to_string(),
    })?;
    let base_dir = file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let includer = FileIncluder::new(base_dir);
    let description = file.display().to_string();
    Config::parse_str_with(&text, &description, &includer)
}
