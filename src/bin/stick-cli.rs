//! Dispatch one request through the kernel from the command line.
//!
//! ```text
//! stick-cli --config stick.toml -- hello bob --verbose
//! ```
//! runs `GET /hello/bob?verbose=` in `cli` mode, prints the body on stdout
//! and the status line on stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use stick_kernel::config::{load_config, StickConfig};
use stick_kernel::dispatch::WriterSink;
use stick_kernel::http::RequestContext;
use stick_kernel::lifecycle::build_kernel;
use stick_kernel::observability::logging;

#[derive(Parser)]
#[command(name = "stick-cli")]
#[command(about = "Run a single request through the Stick kernel", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path segments and options of the emulated request
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        },
        None => StickConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(logging::env_filter(&config.observability))
        .with_writer(std::io::stderr)
        .init();

    let kernel = match build_kernel(&config) {
        Ok(kernel) => kernel,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let request = RequestContext::from_cli_args(cli.args.as_slice());
    let ex = kernel.dispatch(request, Box::new(WriterSink::new(std::io::stdout())));
    println!();
    eprintln!("{} {}", ex.code(), ex.reason());

    if ex.code() >= 400 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
