//! Breadboard - circuit solver CLI
//!
//! Reads a simulation request (JSON) and prints the result (JSON).
//!
//! # Usage
//!
//! ```bash
//! breadboard request.json --pretty
//! RUST_LOG=breadboard_core=debug breadboard request.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use breadboard_core::{
    error::{CircuitError, Result},
    SimulationRequest, SimulationStatus, Simulator,
};

/// Breadboard circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation request (.json)
    #[arg(value_name = "REQUEST_FILE")]
    request_file: PathBuf,

    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,

    /// Log solver progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Newton-Raphson iteration cap for DC solves
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Relative convergence tolerance
    #[arg(long)]
    reltol: Option<f64>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_request(args: &Args) -> Result<SimulationRequest> {
    let text = std::fs::read_to_string(&args.request_file).map_err(|source| {
        CircuitError::FileReadError {
            path: args.request_file.display().to_string(),
            source,
        }
    })?;
    let mut request: SimulationRequest = serde_json::from_str(&text)?;

    let mut config = request.solver_config();
    if let Some(n) = args.max_iterations {
        config = config.with_max_iterations(n);
    }
    if let Some(reltol) = args.reltol {
        config = config.with_reltol(reltol);
    }
    request.solver = Some(config);
    Ok(request)
}

fn run(args: &Args) -> Result<SimulationStatus> {
    let request = load_request(args)?;
    let result = Simulator::new().run(&request, &Default::default());

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(result.status)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(SimulationStatus::InvalidCircuit | SimulationStatus::Error) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
