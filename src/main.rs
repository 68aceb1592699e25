use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use promosim::analysis::{self, Violation};
use promosim::calendar::parse_date;
use promosim::config::{DEFAULT_RETIREMENT_THRESHOLD, Hierarchy, RunParams};
use promosim::error::SimError;
use promosim::export;
use promosim::roster::{self, Roster};
use promosim::simulation::{Outcome, Simulation};
use promosim::types::PersonnelId;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate promotion and retirement cycles over a personnel roster", long_about = None)]
struct Cli {
    /// JSON roster file: an array of rows with id, rank, seniority and dates.
    #[arg(long, conflicts_with = "synthetic")]
    roster: Option<PathBuf>,
    /// Generate a synthetic roster with up to N members per rank when no roster file is given.
    #[arg(long, value_name = "N", default_value_t = 100)]
    synthetic: usize,
    /// Seed for the synthetic roster.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// JSON rank ladder replacing the built-in one.
    #[arg(long)]
    hierarchy: Option<PathBuf>,
    /// First day of the simulated window (dd/mm/yyyy or yyyy-mm-dd). Defaults to today.
    #[arg(long, value_parser = parse_cli_date)]
    start_date: Option<NaiveDate>,
    /// Last day of the simulated window (dd/mm/yyyy or yyyy-mm-dd).
    #[arg(long, value_parser = parse_cli_date)]
    target_date: NaiveDate,
    /// Years of service after which a member retires (31 to 35).
    #[arg(long, default_value_t = DEFAULT_RETIREMENT_THRESHOLD)]
    retirement_threshold: u32,
    /// Member id whose career is recorded. Repeat for up to five members.
    #[arg(long = "trace", value_name = "ID")]
    traced: Vec<u64>,
    /// Additional target dates, each run independently from the same starting roster.
    #[arg(long, value_name = "DATE", value_parser = parse_cli_date)]
    compare: Vec<NaiveDate>,
    /// Write final rosters, histories and the cycle log into this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Verify the roster invariants after every cycle.
    #[arg(long)]
    check_invariants: bool,
    #[arg(long)]
    quiet: bool,
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("unrecognised date {raw:?}, expected dd/mm/yyyy or yyyy-mm-dd"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let hierarchy = match &cli.hierarchy {
        Some(path) => Hierarchy::read_from_file(path)?,
        None => Hierarchy::canonical(),
    };
    let start = cli.start_date.unwrap_or_else(|| Local::now().date_naive());
    let roster = match &cli.roster {
        Some(path) => Roster::read_from_file(&hierarchy, path)?,
        None => Roster::new(&hierarchy, roster::synthetic(&hierarchy, cli.synthetic, start, cli.seed))?,
    };
    let params = RunParams::new(start, cli.target_date)
        .with_retirement_threshold(cli.retirement_threshold)
        .with_traced(cli.traced.iter().copied().map(PersonnelId));

    if cli.compare.is_empty() {
        let mut sim = Simulation::new(hierarchy.clone(), roster, params)?;
        if cli.check_invariants {
            sim = sim.with_invariant_checks();
        }
        sim.run()?;
        let outcome = sim.into_outcome();

        if let Some(dir) = &cli.output_dir {
            write_files(dir, &hierarchy, &outcome, cli.quiet)?;
        }
        if !cli.quiet {
            print_report(&hierarchy, &outcome, cli.check_invariants);
        }
        return Ok(());
    }

    // Every target starts from its own copy of the roster; all validation happens
    // before any run starts.
    let mut targets = vec![cli.target_date];
    targets.extend(cli.compare.iter().copied());
    let sims = targets
        .iter()
        .map(|&target_date| -> Result<Simulation, SimError> {
            let p = RunParams { target_date, ..params.clone() };
            let sim = Simulation::new(hierarchy.clone(), roster.clone(), p)?;
            Ok(if cli.check_invariants { sim.with_invariant_checks() } else { sim })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let outcomes = sims
        .into_par_iter()
        .map(|mut sim| -> Result<Outcome, SimError> {
            sim.run()?;
            Ok(sim.into_outcome())
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(dir) = &cli.output_dir {
        for (target, outcome) in targets.iter().zip(&outcomes) {
            let sub = dir.join(format!("target_{}", target.format("%Y-%m-%d")));
            write_files(&sub, &hierarchy, outcome, cli.quiet)?;
        }
    }
    if !cli.quiet {
        print_comparison(&hierarchy, &params.traced, &targets, &outcomes);
        if cli.check_invariants {
            for (target, outcome) in targets.iter().zip(&outcomes) {
                println!("\n--- Target {} ---", target.format("%d/%m/%Y"));
                print_invariants(&outcome.violations);
            }
        }
    }
    Ok(())
}

fn write_files(dir: &Path, hierarchy: &Hierarchy, outcome: &Outcome, quiet: bool) -> Result<(), SimError> {
    let paths = export::write_outcome(dir, hierarchy, outcome)?;
    if !quiet {
        for path in paths {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn print_report(hierarchy: &Hierarchy, outcome: &Outcome, checked: bool) {
    let promoted: usize = outcome.cycles.iter().map(|c| c.promoted).sum();
    let overflow: usize = outcome.cycles.iter().map(|c| c.overflow_promoted).sum();
    let absorbed: usize = outcome.cycles.iter().map(|c| c.absorbed).sum();
    println!(
        "Cycles run: {}  promotions: {promoted} ({overflow} supernumerary)  absorbed: {absorbed}  retired: {}  active: {}",
        outcome.cycles.len(),
        outcome.retired().len(),
        outcome.active().len(),
    );

    // ── Traced careers ────────────────────────────────────────────────────────
    println!("\n=== Traced careers ===");
    for (id, events) in outcome.history.iter() {
        println!("  Member {id}: {}", analysis::final_status(hierarchy, &outcome.roster, id));
        if events.is_empty() {
            println!("    no movements");
        }
        for ev in events {
            println!("    {ev}");
        }
    }

    // ── Occupancy table ───────────────────────────────────────────────────────
    println!("\n=== Final occupancy ===");
    println!("{:>8} | {:>7} | {:>6} | {:>7} | {:>5}", "Rank", "Normal", "Super", "Ceiling", "Open");
    println!("{}", "-".repeat(8 + 3 + 7 + 3 + 6 + 3 + 7 + 3 + 5));
    for row in analysis::occupancy(hierarchy, &outcome.roster).iter().rev() {
        let ceiling = row.ceiling.map_or_else(|| "-".to_string(), |c| c.to_string());
        let open = row.open().map_or_else(|| "-".to_string(), |o| o.to_string());
        println!("{:>8} | {:>7} | {:>6} | {:>7} | {:>5}", row.rank, row.normal, row.supernumerary, ceiling, open);
    }

    if checked {
        print_invariants(&outcome.violations);
    }
}

fn print_invariants(violations: &[Violation]) {
    let inv = |variant: fn(&Violation) -> bool| {
        if violations.iter().any(variant) { "FAIL" } else { "PASS" }
    };

    println!("\n=== Roster invariants ===");
    println!("  [1] Vacancy ceiling respected:   {}", inv(|v| matches!(v, Violation::VacancyExceeded { .. })));
    println!("  [2] Active and retired disjoint: {}", inv(|v| matches!(v, Violation::ActiveAndRetired { .. })));
    println!("  [3] Retired at most once:        {}", inv(|v| matches!(v, Violation::RetiredTwice { .. })));
    println!("  [4] Nobody lost:                 {}", inv(|v| matches!(v, Violation::Vanished { .. })));
    println!("  [5] Rank never decreases:        {}", inv(|v| matches!(v, Violation::RankDecreased { .. })));
    println!("  [6] At most one rank per cycle:  {}", inv(|v| matches!(v, Violation::MultiRankJump { .. })));

    if violations.is_empty() {
        println!("  All roster invariants: PASS");
    } else {
        println!("\n  {} violation(s):", violations.len());
        for v in violations {
            println!("    {v}");
        }
    }
}

fn print_comparison(hierarchy: &Hierarchy, traced: &[PersonnelId], targets: &[NaiveDate], outcomes: &[Outcome]) {
    println!("\n=== Target comparison ===");
    print!("{:>10} | {:>6} | {:>6} | {:>7}", "Target", "Cycles", "Active", "Retired");
    for id in traced {
        print!(" | {:>28}", format!("Member {id}"));
    }
    println!();

    for (target, outcome) in targets.iter().zip(outcomes) {
        print!(
            "{:>10} | {:>6} | {:>6} | {:>7}",
            target.format("%d/%m/%Y").to_string(),
            outcome.cycles.len(),
            outcome.active().len(),
            outcome.retired().len(),
        );
        for &id in traced {
            let status = analysis::final_status(hierarchy, &outcome.roster, id);
            print!(" | {:>28}", status.to_string());
        }
        println!();
    }
}
