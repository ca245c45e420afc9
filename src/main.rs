//! cas-functest - run commands and check their output on a test target.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cas_functest::channel::{Channel, LocalChannel};
use cas_functest::config::{ConfigLoader, FrameworkConfig};
use cas_functest::display;
use cas_functest::executor::{Executor, ExecutorError, LocalExecutor};
use cas_functest::progress::{ProgressError, ProgressExpectation, ProgressMonitor};
use cas_functest::wait::wait_until;

#[derive(Parser)]
#[command(
    name = "cas-functest",
    about = "Run commands and check their output on a test target",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show commands and failure reasons without truncation.
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the progress bar printed by a command.
    Progress {
        /// Shell command to run.
        command: String,
        /// Expect no progress output (e.g. stdout redirected to a file).
        #[arg(long)]
        absent: bool,
        /// Attach stdout to a pseudo-terminal.
        #[arg(long)]
        pty: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Stream a command's stdout while it runs.
    Tail {
        /// Shell command to run.
        command: String,
        /// Attach stdout to a pseudo-terminal.
        #[arg(long)]
        pty: bool,
        /// Bytes requested per read. A read returns once that many bytes
        /// arrived or the command exited, so larger sizes print in later,
        /// bigger batches.
        #[arg(long, default_value_t = 1)]
        read_size: usize,
    },
    /// Run a command to completion and print its output.
    Run {
        /// Shell command to run.
        command: String,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 90)]
        timeout_secs: u64,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<FrameworkConfig, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

fn start(
    executor: &mut LocalExecutor,
    command: &str,
    pty: bool,
) -> Result<(LocalChannel, LocalChannel), ExecutorError> {
    if pty {
        executor.exec_command_pty(command)
    } else {
        executor.exec_command(command)
    }
}

struct ProgressArgs {
    expectation: ProgressExpectation,
    pty: bool,
    json: bool,
    raw: bool,
}

fn progress(
    config: &FrameworkConfig,
    executor: &mut LocalExecutor,
    command: &str,
    args: &ProgressArgs,
) -> ExitCode {
    display::print_check_start(command, args.raw);
    let monitor = ProgressMonitor::new(config.progress.clone());
    let result = start(executor, command, args.pty)
        .map_err(ProgressError::from)
        .and_then(|(mut stdout, mut stderr)| {
            monitor.watch(command, &mut stdout, &mut stderr, args.expectation)
        });

    match result {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => display::print_error(&e.to_string()),
                }
            } else {
                display::print_check_passed(&report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_check_failed(&e.to_string(), args.raw);
            ExitCode::FAILURE
        }
    }
}

fn tail(
    config: &FrameworkConfig,
    executor: &mut LocalExecutor,
    command: &str,
    pty: bool,
    read_size: usize,
) -> ExitCode {
    let (mut stdout, _stderr) = match start(executor, command, pty) {
        Ok(channels) => channels,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    if !wait_until(
        || stdout.ready(),
        config.progress.appear_timeout(),
        config.progress.poll_interval(),
    ) {
        display::print_error("Command produced no output");
        return ExitCode::FAILURE;
    }

    loop {
        let chunk = stdout.read(read_size);
        if chunk.is_empty() && stdout.closed() {
            break;
        }
        display::print_chunk(&chunk);
    }
    ExitCode::SUCCESS
}

fn run(executor: &mut LocalExecutor, command: &str, timeout: Duration) -> ExitCode {
    match executor.run(command, timeout) {
        Ok(output) => {
            display::print_output(&output);
            if output.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let mut executor =
        match LocalExecutor::with_config(config.executor.clone(), config.channel.clone()) {
            Ok(executor) => executor,
            Err(e) => {
                display::print_error(&e.to_string());
                return ExitCode::FAILURE;
            }
        };

    let code = match cli.command {
        Commands::Progress {
            command,
            absent,
            pty,
            json,
        } => {
            let args = ProgressArgs {
                expectation: if absent {
                    ProgressExpectation::Absent
                } else {
                    ProgressExpectation::Expected
                },
                pty,
                json,
                raw: cli.raw,
            };
            progress(&config, &mut executor, &command, &args)
        }
        Commands::Tail {
            command,
            pty,
            read_size,
        } => tail(&config, &mut executor, &command, pty, read_size),
        Commands::Run {
            command,
            timeout_secs,
        } => run(&mut executor, &command, Duration::from_secs(timeout_secs)),
    };

    executor.shutdown();
    code
}
