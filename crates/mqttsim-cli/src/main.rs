mod reporters;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use mqttsim_core::{scheduler::FailurePolicy, EventLog, Reporter};
use mqttsim_rng::SharedRng;
use reporters::{is_stdout_tty, LogReporter, TableReporter};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "mqtt-sim", version, about = "A configurable MQTT traffic generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the package version.
    Version,
    /// Load and validate a config file without running it.
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run the traffic generator.
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputMode::Auto)]
        output: OutputMode,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long, conflicts_with = "keep_going")]
        fail_fast: bool,
        #[arg(long, conflicts_with = "fail_fast")]
        keep_going: bool,
        #[arg(long)]
        verbose: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputMode {
    Auto,
    Table,
    Log,
}

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_INVALID_CONFIG: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Version => {
            println!("mqtt-sim {}", env!("CARGO_PKG_VERSION"));
            EXIT_SUCCESS
        }
        Command::Validate { config } => run_validate(&config),
        Command::Run {
            config,
            output,
            seed,
            duration,
            fail_fast,
            keep_going,
            verbose,
        } => {
            let _ = keep_going;
            let policy = if fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::KeepGoing
            };
            let rt = tokio::runtime::Runtime::new().expect("failed to start async runtime");
            rt.block_on(run_engine(config, output, seed, duration, policy, verbose))
        }
    };
    std::process::exit(code);
}

fn run_validate(config: &PathBuf) -> i32 {
    match mqttsim_config::load_plan(config) {
        Ok(_) => {
            println!("{}: valid", config.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", config.display());
            EXIT_INVALID_CONFIG
        }
    }
}

async fn run_engine(
    config: PathBuf,
    output: OutputMode,
    seed: Option<u64>,
    duration: Option<f64>,
    policy: FailurePolicy,
    verbose: bool,
) -> i32 {
    let plan = match mqttsim_config::load_plan(&config) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}: {e}", config.display());
            return EXIT_INVALID_CONFIG;
        }
    };

    let streams = match mqttsim_core::build_resolved_streams(&plan) {
        Ok(streams) => streams,
        Err(e) => {
            eprintln!("{}: {e}", config.display());
            return EXIT_INVALID_CONFIG;
        }
    };

    let reporter: Arc<dyn Reporter> = match output {
        OutputMode::Table => Arc::new(TableReporter::new()),
        OutputMode::Log => Arc::new(LogReporter::new(verbose)),
        OutputMode::Auto => {
            if is_stdout_tty() {
                Arc::new(TableReporter::new())
            } else {
                Arc::new(LogReporter::new(verbose))
            }
        }
    };

    let event_log = match EventLog::open(&mqttsim_core::event_log::default_log_path()) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            eprintln!("warning: failed to open file log: {e}");
            None
        }
    };

    let opened = mqttsim_core::open_publishers(&plan).await;
    let mut publishers: std::collections::HashMap<String, Arc<dyn mqttsim_core::Transport>> =
        std::collections::HashMap::new();
    let mut failed_brokers = std::collections::HashSet::new();
    for (name, result) in opened {
        match result {
            Ok(publisher) => {
                publishers.insert(name, publisher);
            }
            Err(e) => {
                eprintln!("broker '{name}': {e}");
                failed_brokers.insert(name);
            }
        }
    }

    let runnable: Vec<_> = streams
        .into_iter()
        .filter(|s| !failed_brokers.contains(&s.broker))
        .collect();

    if runnable.is_empty() {
        eprintln!("no stream could be started: every referenced broker failed to connect");
        return EXIT_RUNTIME_FAILURE;
    }

    let rng = Arc::new(match seed {
        Some(seed) => SharedRng::seeded(seed),
        None => SharedRng::from_entropy(),
    });

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let duration = duration.map(Duration::from_secs_f64);

    let outcome = mqttsim_core::scheduler::run(
        runnable,
        publishers,
        rng,
        reporter,
        event_log,
        policy,
        duration,
        cancel,
    )
    .await;

    match policy {
        FailurePolicy::FailFast => {
            if outcome.any_stream_errored {
                EXIT_RUNTIME_FAILURE
            } else {
                EXIT_SUCCESS
            }
        }
        FailurePolicy::KeepGoing => {
            if outcome.total_publishes >= 1 {
                EXIT_SUCCESS
            } else {
                EXIT_RUNTIME_FAILURE
            }
        }
    }
}
