use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tracer::demo::{self, DemoConfig};
use tracer::error::Error;
use tracer::serialize::Format;
use tracer::writer::{ConsoleWriter, FileWriter, Writer};
use tracer_core::{TraceResult, Tracer};

#[derive(Parser)]
#[command(
    name = "tracer",
    about = "Trace nested method calls per thread and print the call tree",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace the sample workload: nested calls on the main thread, a second
    /// thread, and recursion on both.
    Demo {
        /// Depth of the recursive chain on the worker thread.
        #[arg(long, default_value_t = 3)]
        recursion: u32,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Trace a single recursive chain on the main thread.
    Recurse {
        /// Number of nested calls.
        #[arg(long, default_value_t = 3)]
        depth: u32,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output format (repeatable).
    #[arg(long = "format", value_enum, default_values_t = [Format::Json])]
    formats: Vec<Format>,

    /// Also write each format to trace.<ext> in DIR. Falls back to
    /// TRACER_OUT_DIR.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Base unit of simulated work, in milliseconds.
    #[arg(long, default_value_t = 50)]
    unit_ms: u64,

    /// Do not print results to stdout.
    #[arg(long)]
    quiet: bool,
}

impl OutputArgs {
    fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    fn out_dir(&self) -> Option<PathBuf> {
        self.out_dir
            .clone()
            .or_else(|| std::env::var_os("TRACER_OUT_DIR").map(PathBuf::from))
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Log to stderr so serialized output on stdout stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tracer=info,tracer_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), Error> {
    let tracer = Tracer::new();
    match cli.command {
        Commands::Demo { recursion, output } => {
            let config = DemoConfig {
                unit: output.unit(),
                recursion,
            };
            let result = demo::run(&tracer, &config)?;
            emit(&result, &output)
        }
        Commands::Recurse { depth, output } => {
            let result = demo::run_recursion(&tracer, depth, output.unit())?;
            emit(&result, &output)
        }
    }
}

fn emit(result: &TraceResult, output: &OutputArgs) -> Result<(), Error> {
    let out_dir = output.out_dir();
    let mut console = ConsoleWriter;
    for format in &output.formats {
        let serializer = format.serializer();
        let text = serializer.serialize(result)?;
        if !output.quiet {
            console.write(&text)?;
        }
        if let Some(dir) = &out_dir {
            let path = dir.join(format!("trace.{}", serializer.extension()));
            FileWriter::new(path).write(&text)?;
        }
    }
    Ok(())
}
