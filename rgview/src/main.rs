mod display;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use isa::{BuildOutputAggregator, Config, EntrypointDisassemblyStore, ResourceUsageAnalyzer};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a disassembly CSV with source correlation
    Isa {
        csv: PathBuf,

        /// Highlight instructions generated for this source line
        #[arg(short, long)]
        source_line: Option<u32>,
    },

    /// Print a resource usage CSV with hazards
    Usage { csv: PathBuf },

    /// List the build outputs of a session metadata file
    Session {
        xml: PathBuf,

        /// Target GPU of a pipeline build
        #[arg(short, long)]
        target: Option<String>,

        /// Also print every listed disassembly
        #[arg(short, long)]
        dump: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> isa::Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };
    tracing::debug!(?config, "configuration");

    match args.command {
        Command::Isa { csv, source_line } => {
            let mut store = EntrypointDisassemblyStore::new();
            store.load_from_csv(&csv)?;
            display::print_disassembly(&csv, &store, source_line);
        }

        Command::Usage { csv } => {
            let analyzer = ResourceUsageAnalyzer::new(&config);
            for record in isa::usage::load_resource_usage(&csv)? {
                display::print_usage(&analyzer.report(&record));
            }
        }

        Command::Session { xml, target, dump } => {
            let session = isa::read_session_metadata(&xml, target.as_deref())?;
            display::print_session_header(&xml, &session);

            let mut agg = BuildOutputAggregator::new(config);
            agg.update_build_output(session.into_outputs());

            let keys: Vec<_> = agg
                .outputs()
                .entries()
                .map(|e| (e.target_gpu.clone(), e.input_file.clone(), e.entry_point.clone()))
                .collect();
            for (gpu, file, entry) in keys {
                if let Some(e) = agg.entry(&gpu, &file, &entry) {
                    display::print_entry(e);
                }
                if let Some(report) = agg.resource_usage_report(&gpu, &file, &entry)? {
                    display::print_usage(&report);
                }
                if dump {
                    if let Some(store) = agg.disassembly(&gpu, &file, &entry)? {
                        let path = store.path().map(PathBuf::from).unwrap_or_default();
                        display::print_disassembly(&path, store, None);
                    }
                }
            }
        }
    }
    Ok(())
}
