//! Rank occupancy report for a roster file, without running any cycle.
//!
//! Prints per-rank normal and supernumerary counts against the ceilings, plus how many
//! members already meet the time-in-rank requirement on the given date.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::Parser;

use promosim::analysis::occupancy;
use promosim::calendar::{parse_date, whole_years};
use promosim::config::{Hierarchy, OVERFLOW_YEARS};
use promosim::error::ConfigError;
use promosim::roster::Roster;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-rank occupancy of a roster file", long_about = None)]
struct Cli {
    /// JSON roster file.
    roster: PathBuf,
    /// JSON rank ladder replacing the built-in one.
    #[arg(long)]
    hierarchy: Option<PathBuf>,
    /// Date used for time-in-rank counts (dd/mm/yyyy or yyyy-mm-dd). Defaults to today.
    #[arg(long, value_parser = parse_cli_date)]
    date: Option<NaiveDate>,
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("unrecognised date {raw:?}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match report(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn report(cli: &Cli) -> Result<(), ConfigError> {
    let hierarchy = match &cli.hierarchy {
        Some(path) => Hierarchy::read_from_file(path)?,
        None => Hierarchy::canonical(),
    };
    let roster = Roster::read_from_file(&hierarchy, &cli.roster)?;
    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());

    // Members meeting the ordinary and the overflow time requirement, per rank.
    let mut due = vec![0usize; hierarchy.len()];
    let mut overflow_due = vec![0usize; hierarchy.len()];
    for r in roster.active() {
        if r.rank == hierarchy.top() {
            continue;
        }
        let years = whole_years(r.last_promotion, date);
        if years >= hierarchy.min_years_in_rank(r.rank) as i32 {
            due[r.rank.0] += 1;
        }
        if hierarchy.is_supernumerary_eligible(r.rank) && years >= OVERFLOW_YEARS {
            overflow_due[r.rank.0] += 1;
        }
    }

    println!("{}: {} active members on {}", cli.roster.display(), roster.len(), date.format("%d/%m/%Y"));
    println!(
        "\n{:>8} | {:>7} | {:>6} | {:>7} | {:>5} | {:>5} | {:>9}",
        "Rank", "Normal", "Super", "Ceiling", "Open", "Due", "Overflow"
    );
    println!("{}", "-".repeat(8 + 3 + 7 + 3 + 6 + 3 + 7 + 3 + 5 + 3 + 5 + 3 + 9));
    let rows = occupancy(&hierarchy, &roster);
    for (rank, row) in hierarchy.ranks().zip(&rows).rev() {
        let ceiling = row.ceiling.map_or_else(|| "-".to_string(), |c| c.to_string());
        let open = row.open().map_or_else(|| "-".to_string(), |o| o.to_string());
        println!(
            "{:>8} | {:>7} | {:>6} | {:>7} | {:>5} | {:>5} | {:>9}",
            row.rank, row.normal, row.supernumerary, ceiling, open, due[rank.0], overflow_due[rank.0]
        );
    }

    let over: Vec<_> = rows.iter().filter(|r| r.ceiling.is_some_and(|c| r.normal > c)).collect();
    if !over.is_empty() {
        eprintln!("\nWarning: {} rank(s) already above their ceiling", over.len());
        for r in over {
            eprintln!("  {}: {} normal, ceiling {}", r.rank, r.normal, r.ceiling.unwrap_or_default());
        }
    }
    Ok(())
}
