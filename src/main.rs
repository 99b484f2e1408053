use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use census::{CensusConfig, Scenario, ScenarioOutcome};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "census", about = "Leak-checking scenarios over a live-object census")]
struct Cli {
    /// Log census details at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available scenarios.
    List,
    /// Run scenarios (all of them when none are named).
    Run {
        /// Scenario names, e.g. `checkpoint-diff`.
        scenarios: Vec<String>,
        /// Print the census each scenario saw when it checked.
        #[arg(long)]
        report: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List => run_list(),
        Commands::Run { scenarios, report } => run_scenarios(&scenarios, report, cli.verbose)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "census=debug" } else { "census=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_list() {
    for scenario in Scenario::ALL {
        let note = if scenario.known_issue().is_some() {
            " [known failure]"
        } else {
            ""
        };
        println!(
            "{:<22} {} ({}){}",
            scenario.name(),
            scenario.description(),
            scenario.expectation(),
            note
        );
    }
}

fn run_scenarios(names: &[String], report: bool, verbose: bool) -> Result<()> {
    let selected = parse_selection(names)?;
    let config = CensusConfig::from_env().with_verbose(verbose);

    let mut outcomes = Vec::with_capacity(selected.len());
    for scenario in selected {
        let outcome = scenario
            .run_with(config.clone())
            .with_context(|| format!("scenario {} could not run", scenario))?;
        println!("{}", outcome);
        if let Some(issue) = scenario.known_issue().filter(|_| !outcome.passed()) {
            println!("    note: {}", issue);
        }
        if report {
            println!("{}", outcome.report);
        }
        outcomes.push(outcome);
    }

    let unexpected: Vec<&ScenarioOutcome> = outcomes
        .iter()
        .filter(|o| !o.passed() && !o.is_known_failure())
        .collect();
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    println!(
        "\n{} passed, {} known failures, {} unexpected failures",
        passed,
        outcomes.iter().filter(|o| o.is_known_failure()).count(),
        unexpected.len()
    );

    if !unexpected.is_empty() {
        bail!(
            "unexpected failures: {}",
            unexpected
                .iter()
                .map(|o| o.scenario.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}

fn parse_selection(names: &[String]) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(Scenario::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            name.parse::<Scenario>()
                .context("run `census list` to see available scenarios")
        })
        .collect()
}
