use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use podheal::connection::ConnectionState;
use podheal::scenario::load_scenario;
use podheal::solution::Solution;
use podheal::solver::{CIPMultipleBatchSolver, Solver};

/// Plan pod-restart batches that heal weak connections.
#[derive(Debug, Parser)]
#[command(name = "podheal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a scenario manifest and synthesize a connection state, printed as JSON.
    Generate {
        /// Path to the TOML scenario manifest.
        scenario_file: PathBuf,
    },
    /// Load a connection state and plan a healing solution, printed as JSON.
    Solve {
        /// Path to a serialized ConnectionState (JSON).
        state_file: PathBuf,
    },
    /// Pretty-print a connection state for humans.
    State {
        /// Path to a serialized ConnectionState (JSON).
        file: PathBuf,
    },
    /// Pretty-print a solution for humans.
    Solution {
        /// Path to a serialized Solution (JSON).
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate { scenario_file } => {
            let manifest = fs::read_to_string(scenario_file)?;
            let state = load_scenario(&manifest)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Solve { state_file } => {
            let contents = fs::read_to_string(state_file)?;
            let state: ConnectionState = serde_json::from_str(&contents)?;
            let planner = CIPMultipleBatchSolver::new();
            let solution = planner.solve(&state)?;
            println!("{}", serde_json::to_string_pretty(&solution)?);
        }
        Command::State { file } => {
            let contents = fs::read_to_string(file)?;
            let state: ConnectionState = serde_json::from_str(&contents)?;
            print_state(&state);
        }
        Command::Solution { file } => {
            let contents = fs::read_to_string(file)?;
            let solution: Solution = serde_json::from_str(&contents)?;
            print_solution(&solution);
        }
    }
    Ok(())
}

fn print_state(state: &ConnectionState) {
    println!("pods: {}", state.pods.len());
    for (name, pods) in state.pods.types() {
        println!(
            "  type {name}: {} pods, config {:?}",
            pods.len(),
            state.pods.config(&name)
        );
    }
    println!("weak edges:");
    for (s, t) in state.edges() {
        println!("  {s} -> {t}");
    }
}

fn print_solution(solution: &Solution) {
    let (covered, batches, majors, restarted) = solution.evaluated();
    println!(
        "batches: {batches}, covered edges: {covered}, majors: {majors}, restarted pods: {restarted}"
    );
    for (i, batch) in solution.batches.iter().enumerate() {
        let ids: Vec<String> = batch.pods.iter().map(|p| p.id()).collect();
        println!("  batch {i}: {}", ids.join(", "));
    }
}
