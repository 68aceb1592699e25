use chrono::NaiveDate;
use tracing::debug;

use crate::config::Hierarchy;
use crate::error::SimError;
use crate::history::{EventKind, History};
use crate::roster::Roster;

/// Fill open normal slots at each rank with that rank's supernumerary occupants,
/// most senior first. Rank and time in rank are left untouched.
///
/// Returns how many occupants were converted.
pub fn run(
    roster: &mut Roster,
    hierarchy: &Hierarchy,
    date: NaiveDate,
    history: &mut History,
) -> Result<usize, SimError> {
    let mut absorbed = 0;

    for rank in hierarchy.ranks() {
        let open = hierarchy.open_slots(rank, roster.count_normal_at(rank));
        if open == 0 {
            continue;
        }

        for id in roster.supernumeraries_at(rank).into_iter().take(open) {
            roster.absorb(id)?;
            absorbed += 1;
            debug!(id = %id, rank = hierarchy.label(rank), "absorbed");
            history.record(id, date, EventKind::Absorbed, hierarchy.label(rank));
        }
    }

    Ok(absorbed)
}
