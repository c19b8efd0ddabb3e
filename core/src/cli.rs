use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::engine::{
    CommandOutput, CommandSource, ExecutionControl, ExecutionOutcome, Limits, ResultCallback,
    SharedTracer, TraceWriter,
};
use crate::logging::init_logging;
use crate::pack::Pack;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay - run command lines against a function pack", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Commands allowed per dispatch (overrides config file and env vars)
    #[arg(long, global = true)]
    pub max_commands: Option<usize>,

    /// Log level (RELAY_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch one command line
    Run {
        /// Function pack (TOML)
        #[arg(short = 'p', long = "pack")]
        pack: PathBuf,

        /// Name of the dispatching source
        #[arg(long, default_value = "server")]
        name: String,

        /// The command line, e.g. `execute as @all run function demo:main`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a function with the execution trace written out
    Trace {
        /// Function pack (TOML)
        #[arg(short = 'p', long = "pack")]
        pack: PathBuf,

        /// Trace file (default: stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Function id or #tag
        function: String,
    },

    /// Report body lines that don't compile
    Check {
        /// Function pack (TOML)
        #[arg(short = 'p', long = "pack")]
        pack: PathBuf,
    },
}

/// Prints success messages to stdout and failures to stderr
struct ConsoleOutput;

impl CommandOutput for ConsoleOutput {
    fn send_success(&self, message: &str) {
        println!("{}", message);
    }

    fn send_failure(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // .env first, so its values sit below real env vars
    let _ = dotenvy::dotenv();

    let config = EngineConfig::builder()
        .config_path(cli.config)
        .max_command_chain_length(cli.max_commands)
        .log_level(cli.log_level)
        .build()?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Run {
            pack,
            name,
            command,
        } => {
            let pack = load_pack(&pack, &config)?;
            let source = CommandSource::new(name, Rc::new(ConsoleOutput)).with_callback(
                ResultCallback::sink(|success, result| {
                    if success {
                        println!("-> {}", result);
                    } else {
                        println!("-> failed");
                    }
                }),
            );
            let mut ctl = ExecutionControl::new(Limits::from(&config)).with_return_consumer(
                ResultCallback::sink(|success, result| {
                    if success {
                        println!("Returned {}", result);
                    } else {
                        println!("Returned failure");
                    }
                }),
            );

            let line = command.join(" ");
            // Compile errors were already reported through the source
            let Ok(outcome) = pack.dispatch(&mut ctl, &source, &line) else {
                std::process::exit(1);
            };
            print_outcome(&outcome);

            if !pack.scoreboard().is_empty() {
                println!("\nScores:");
                for (holder, objective, value) in pack.scoreboard().entries() {
                    println!("  {} [{}] = {}", holder, objective, value);
                }
            }
        }

        Commands::Trace {
            pack,
            output,
            function,
        } => {
            let pack = load_pack(&pack, &config)?;
            let out: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create trace file {:?}", path))?,
                ),
                None => Box::new(std::io::stdout()),
            };

            let writer = TraceWriter::shared(out);
            let tracer: SharedTracer = writer.clone();
            let mut ctl = ExecutionControl::new(Limits::from(&config)).with_tracer(tracer);
            let source = CommandSource::new("server", Rc::new(ConsoleOutput));

            let dispatched = pack.dispatch(&mut ctl, &source, &format!("function {}", function));
            writer
                .borrow_mut()
                .finish()
                .context("Failed to write trace")?;

            let Ok(outcome) = dispatched else {
                std::process::exit(1);
            };
            print_outcome(&outcome);
            if let Some(path) = output {
                println!("Trace written to {}", path.display());
            }
        }

        Commands::Check { pack } => {
            let pack = load_pack(&pack, &config)?;
            let errors = pack.check();

            if errors.is_empty() {
                println!("✓ {} function(s) OK", pack.function_ids().count());
                return Ok(());
            }

            for error in &errors {
                println!("{}:{}: {}", error.function, error.line, error.message);
            }
            eprintln!("Found {} invalid line(s)", errors.len());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_pack(path: &Path, config: &EngineConfig) -> Result<Pack> {
    Pack::load(path, config.trace_dir.clone())
        .with_context(|| format!("Failed to load pack {:?}", path))
}

fn print_outcome(outcome: &ExecutionOutcome) {
    tracing::info!(
        commands = outcome.commands_executed,
        quota_exhausted = outcome.quota_exhausted,
        "Dispatch finished"
    );
    if outcome.quota_exhausted {
        eprintln!(
            "Command limit reached after {} commands; remaining work was dropped",
            outcome.commands_executed
        );
    }
}
