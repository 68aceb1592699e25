use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::whole_years;
use crate::config::{Hierarchy, RETIREMENT_AGE};
use crate::error::SimError;
use crate::history::{EventKind, History};
use crate::roster::{PersonnelRecord, Roster};

/// Age and service limits. Either one reached on a cycle date retires the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetirementRule {
    pub max_age: i32,
    pub max_service: i32,
}

impl RetirementRule {
    pub fn new(service_threshold: u32) -> Self {
        RetirementRule { max_age: RETIREMENT_AGE, max_service: service_threshold as i32 }
    }

    /// Missing birth or admission dates count as zero years and never trigger.
    pub fn applies(&self, record: &PersonnelRecord, date: NaiveDate) -> bool {
        let age = record.birth.map_or(0, |b| whole_years(b, date));
        let service = record.admission.map_or(0, |a| whole_years(a, date));
        age >= self.max_age || service >= self.max_service
    }
}

/// Move everyone meeting `rule` on `date` to the retired collection in one step.
///
/// Returns how many members retired.
pub fn run(
    roster: &mut Roster,
    hierarchy: &Hierarchy,
    rule: RetirementRule,
    date: NaiveDate,
    history: &mut History,
) -> Result<usize, SimError> {
    let leaving: Vec<&PersonnelRecord> = roster.active().iter().filter(|r| rule.applies(r, date)).collect();
    if leaving.is_empty() {
        return Ok(0);
    }

    for record in &leaving {
        debug!(id = %record.id, rank = hierarchy.label(record.rank), "retired");
        history.record(record.id, date, EventKind::Retired, hierarchy.label(record.rank));
    }

    let ids: Vec<_> = leaving.iter().map(|r| r.id).collect();
    roster.retire_many(&ids, date)?;
    Ok(ids.len())
}
