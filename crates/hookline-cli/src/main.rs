#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use hookline_core::CompilerKind;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hookline")]
#[command(author, version, about = "Inspect module resolution and loading in a TypeScript workspace", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Compiler backend for TypeScript and JSON (overrides package.json)
    #[arg(long, global = true, value_name = "NAME")]
    compiler: Option<CompilerKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve specifiers the way the resolve hook would
    Resolve {
        /// Specifiers to resolve
        #[arg(required = true)]
        specifiers: Vec<String>,

        /// Importing file (defaults to <cwd>/index.ts)
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Extra export conditions
        #[arg(long = "condition", short = 'C', value_name = "NAME")]
        conditions: Vec<String>,
    },

    /// Resolve a specifier and print the transformed source
    Load {
        /// Specifier or path to load
        specifier: String,

        /// Importing file (defaults to <cwd>/index.ts)
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Print the registered source map instead of the source
        #[arg(long)]
        map: bool,
    },

    /// List workspace packages addressable as @-/<slug>
    Workspaces,
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
struct Config {
    cwd: PathBuf,
    json: bool,
    verbosity: u8,
    compiler: Option<CompilerKind>,
}

impl Config {
    fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            json: false,
            verbosity: 0,
            compiler: None,
        }
    }

    fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn with_compiler(mut self, compiler: Option<CompilerKind>) -> Self {
        self.compiler = compiler;
        self
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json(cli.json)
        .with_compiler(cli.compiler);

    logging::init(config.verbosity, config.json);

    match cli.command {
        None | Some(Commands::Version) => commands::version::run(config.json),
        Some(Commands::Resolve {
            specifiers,
            from,
            conditions,
        }) => commands::resolve::run(
            &config.cwd,
            &specifiers,
            from.as_deref(),
            &conditions,
            config.compiler,
            config.json,
        ),
        Some(Commands::Load {
            specifier,
            from,
            map,
        }) => commands::load::run(
            &config.cwd,
            &specifier,
            from.as_deref(),
            map,
            config.compiler,
            config.json,
        ),
        Some(Commands::Workspaces) => commands::workspaces::run(&config.cwd, config.json),
    }
}
