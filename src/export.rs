use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Hierarchy;
use crate::error::SimError;
use crate::history::History;
use crate::roster::{PersonnelRecord, RetiredRecord};
use crate::simulation::{CycleReport, Outcome};

pub const ACTIVE_CSV: &str = "active.csv";
pub const RETIRED_CSV: &str = "retired.csv";
pub const HISTORY_NDJSON: &str = "history.ndjson";
pub const CYCLES_NDJSON: &str = "cycles.ndjson";

const ROSTER_HEADER: &str = "id,rank,seniority,last_promotion,admission,birth,supernumerary";

fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default()
}

fn write_roster_row<W: Write>(w: &mut W, hierarchy: &Hierarchy, r: &PersonnelRecord) -> io::Result<()> {
    write!(
        w,
        "{},{},{},{},{},{},{}",
        r.id,
        csv_field(hierarchy.label(r.rank)),
        r.seniority,
        fmt_date(Some(r.last_promotion)),
        fmt_date(r.admission),
        fmt_date(r.birth),
        if r.supernumerary { "x" } else { "" },
    )
}

/// Final active roster, one row per member in roster order.
pub fn write_active_csv<W: Write>(w: &mut W, hierarchy: &Hierarchy, records: &[PersonnelRecord]) -> io::Result<()> {
    writeln!(w, "{ROSTER_HEADER}")?;
    for r in records {
        write_roster_row(w, hierarchy, r)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Retired collection in retirement order, with the effective date appended.
pub fn write_retired_csv<W: Write>(w: &mut W, hierarchy: &Hierarchy, records: &[RetiredRecord]) -> io::Result<()> {
    writeln!(w, "{ROSTER_HEADER},retired_on")?;
    for r in records {
        write_roster_row(w, hierarchy, &r.record)?;
        writeln!(w, ",{}", fmt_date(Some(r.retired_on)))?;
    }
    Ok(())
}

fn write_ndjson<'a, W, T, I>(w: &mut W, items: I) -> io::Result<()>
where
    W: Write,
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    for item in items {
        serde_json::to_writer(&mut *w, item)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Every traced event, one JSON object per line, grouped by member in trace order.
pub fn write_history_ndjson<W: Write>(w: &mut W, history: &History) -> io::Result<()> {
    write_ndjson(w, history.iter().flat_map(|(_, events)| events))
}

pub fn write_cycles_ndjson<W: Write>(w: &mut W, cycles: &[CycleReport]) -> io::Result<()> {
    write_ndjson(w, cycles)
}

fn write_file<F>(path: PathBuf, body: F) -> Result<PathBuf, SimError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let result = File::create(&path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        body(&mut writer)?;
        writer.flush()
    });
    match result {
        Ok(()) => Ok(path),
        Err(source) => Err(SimError::Write { path, source }),
    }
}

/// Write the four result files into `dir`, creating it if needed. Returns the paths written.
pub fn write_outcome(dir: &Path, hierarchy: &Hierarchy, outcome: &Outcome) -> Result<Vec<PathBuf>, SimError> {
    fs::create_dir_all(dir).map_err(|source| SimError::Write { path: dir.to_path_buf(), source })?;
    Ok(vec![
        write_file(dir.join(ACTIVE_CSV), |w| write_active_csv(w, hierarchy, outcome.active()))?,
        write_file(dir.join(RETIRED_CSV), |w| write_retired_csv(w, hierarchy, outcome.retired()))?,
        write_file(dir.join(HISTORY_NDJSON), |w| write_history_ndjson(w, &outcome.history))?,
        write_file(dir.join(CYCLES_NDJSON), |w| write_cycles_ndjson(w, &outcome.cycles))?,
    ])
}
