use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

const CORE: &str = "dispatch_core";

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the dispatch simulator workspace",
    long_about = "Runs scenarios, benchmarks, load tests and CI checks\n\
                  for the dispatch simulator workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario on a map file (defaults to the bundled city map)
    Run {
        /// Edge-list map file
        #[arg(long, env = "DISPATCH_MAP")]
        map: Option<String>,
        /// JSON scenario parameters
        #[arg(long, env = "DISPATCH_PARAMS", requires = "map")]
        params: Option<String>,
    },
    /// Run the dispatch_core test suite
    Test,
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, example, benchmarks)
    Ci {
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run load tests (ignored tests in dispatch_core)
    LoadTest,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the example scenario
    Examples,
    Bench,
    /// Run check + examples + bench
    All,
}

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn spawn(program: &str, args: &[&str]) -> ExitStatus {
    eprintln!("+ {program} {}", args.join(" "));
    match Command::new(program).args(args).status() {
        Ok(status) => status,
        Err(err) => {
            eprintln!("failed to execute {program}: {err}");
            exit(1);
        }
    }
}

fn run(program: &str, args: &[&str]) {
    let status = spawn(program, args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_cargo(args: &[&str]) {
    run("cargo", args);
}

fn run_scenario(map: Option<&str>, params: Option<&str>) {
    let mut args = vec!["run", "-p", CORE, "--example", "scenario_run", "--release"];
    if map.is_some() || params.is_some() {
        args.push("--");
    }
    args.extend(map);
    args.extend(params);
    run_cargo(&args);
}

fn bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", CORE, "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test dispatch_core");
    run_cargo(&["test", "-p", CORE]);
}

fn ci_examples() {
    step("Run scenario_run on the bundled city map");
    run_scenario(None, None);
}

fn ci_bench() {
    step("Run benchmarks");
    bench(&[]);
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { map, params } => run_scenario(map.as_deref(), params.as_deref()),
        Commands::Test => run_cargo(&["test", "-p", CORE]),
        Commands::Bench => bench(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                if let Err(err) = std::fs::remove_dir_all(baseline_dir) {
                    eprintln!("failed to remove target/criterion: {err}");
                    exit(1);
                }
            }

            step("Stashing current changes");
            run(
                "git",
                &["stash", "push", "-m", "Temporary stash for benchmark comparison"],
            );

            step("Running benchmark to create baseline");
            bench(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run("git", &["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            bench(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LoadTest => {
            run_cargo(&[
                "test",
                "-p",
                CORE,
                "--test",
                "load_tests",
                "--",
                "--ignored",
            ]);
        }
    }
}
