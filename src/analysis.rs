use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Hierarchy;
use crate::roster::Roster;
use crate::types::{PersonnelId, Rank};

/// Where everybody stood before a cycle, for comparison once the cycle is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankSnapshot {
    ranks: HashMap<PersonnelId, Rank>,
    normal_counts: Vec<usize>,
}

impl RankSnapshot {
    pub fn capture(hierarchy: &Hierarchy, roster: &Roster) -> Self {
        RankSnapshot {
            ranks: roster.active().iter().map(|r| (r.id, r.rank)).collect(),
            normal_counts: hierarchy.ranks().map(|rank| roster.count_normal_at(rank)).collect(),
        }
    }

    pub fn rank_of(&self, id: PersonnelId) -> Option<Rank> {
        self.ranks.get(&id).copied()
    }

    pub fn normal_count(&self, rank: Rank) -> usize {
        self.normal_counts.get(rank.0).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Violation {
    /// A cycle left more normal occupants at a rank than its ceiling allows, and more
    /// than the rank already held before the cycle.
    VacancyExceeded { date: NaiveDate, rank: String, normal: usize, ceiling: usize },
    /// The same id is both active and retired.
    ActiveAndRetired { id: PersonnelId },
    /// The same id was retired more than once.
    RetiredTwice { id: PersonnelId },
    /// An id present before the cycle is neither active nor retired after it.
    Vanished { date: NaiveDate, id: PersonnelId },
    RankDecreased { date: NaiveDate, id: PersonnelId, from: String, to: String },
    /// Moved more than one rank within a single cycle.
    MultiRankJump { date: NaiveDate, id: PersonnelId, from: String, to: String },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VacancyExceeded { date, rank, normal, ceiling } => {
                write!(f, "VacancyExceeded {date} rank={rank}: normal={normal} ceiling={ceiling}")
            }
            Self::ActiveAndRetired { id } => write!(f, "ActiveAndRetired id={id}"),
            Self::RetiredTwice { id } => write!(f, "RetiredTwice id={id}"),
            Self::Vanished { date, id } => write!(f, "Vanished {date} id={id}"),
            Self::RankDecreased { date, id, from, to } => {
                write!(f, "RankDecreased {date} id={id}: {from} -> {to}")
            }
            Self::MultiRankJump { date, id, from, to } => {
                write!(f, "MultiRankJump {date} id={id}: {from} -> {to}")
            }
        }
    }
}

/// Vacancy bound: no rank may end up with more normal occupants than its ceiling,
/// unless it already held that many before the cycle.
pub fn verify_vacancies(
    hierarchy: &Hierarchy,
    date: NaiveDate,
    before: &RankSnapshot,
    roster: &Roster,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for rank in hierarchy.ranks() {
        let Some(ceiling) = hierarchy.vacancy_ceiling(rank) else {
            continue;
        };
        let normal = roster.count_normal_at(rank);
        if normal > ceiling.max(before.normal_count(rank)) {
            violations.push(Violation::VacancyExceeded {
                date,
                rank: hierarchy.label(rank).to_string(),
                normal,
                ceiling,
            });
        }
    }
    violations
}

/// Ownership and rank movement: every id is active or retired but not both, ranks
/// never go down, and nobody moves more than one rank in a cycle.
pub fn verify_movements(
    hierarchy: &Hierarchy,
    date: NaiveDate,
    before: &RankSnapshot,
    roster: &Roster,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen_retired = HashSet::new();

    for rr in roster.retired() {
        let id = rr.record.id;
        if roster.contains(id) {
            violations.push(Violation::ActiveAndRetired { id });
        }
        if !seen_retired.insert(id) {
            violations.push(Violation::RetiredTwice { id });
        }
    }

    let mut vanished: Vec<_> = before
        .ranks
        .keys()
        .filter(|&&id| !roster.contains(id) && !roster.is_retired(id))
        .copied()
        .collect();
    vanished.sort_unstable();
    violations.extend(vanished.into_iter().map(|id| Violation::Vanished { date, id }));

    let moved_this_cycle = roster
        .active()
        .iter()
        .chain(roster.retired().iter().filter(|rr| rr.retired_on == date).map(|rr| &rr.record));
    for record in moved_this_cycle {
        let Some(prev) = before.rank_of(record.id) else {
            continue;
        };
        let from = || hierarchy.label(prev).to_string();
        let to = || hierarchy.label(record.rank).to_string();
        if record.rank < prev {
            violations.push(Violation::RankDecreased { date, id: record.id, from: from(), to: to() });
        } else if record.rank.0 > prev.0 + 1 {
            violations.push(Violation::MultiRankJump { date, id: record.id, from: from(), to: to() });
        }
    }

    violations
}

/// Head count of one rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankOccupancy {
    pub rank: String,
    pub normal: usize,
    pub supernumerary: usize,
    pub ceiling: Option<usize>,
}

impl RankOccupancy {
    /// Unfilled regular slots; `None` for a rank without a ceiling.
    pub fn open(&self) -> Option<usize> {
        self.ceiling.map(|c| c.saturating_sub(self.normal))
    }
}

/// Per-rank occupancy, lowest rank first.
pub fn occupancy(hierarchy: &Hierarchy, roster: &Roster) -> Vec<RankOccupancy> {
    hierarchy
        .ranks()
        .map(|rank| RankOccupancy {
            rank: hierarchy.label(rank).to_string(),
            normal: roster.count_normal_at(rank),
            supernumerary: roster.count_supernumerary_at(rank),
            ceiling: hierarchy.vacancy_ceiling(rank),
        })
        .collect()
}

/// Where a member ended up once the run is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FinalStatus {
    Active { rank: String, supernumerary: bool },
    Retired { rank: String, on: NaiveDate },
    NotInRoster,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active { rank, supernumerary: true } => write!(f, "{rank} (supernumerary)"),
            Self::Active { rank, supernumerary: false } => write!(f, "{rank} (active)"),
            Self::Retired { rank, on } => write!(f, "retired as {rank} on {}", on.format("%d/%m/%Y")),
            Self::NotInRoster => write!(f, "not in roster"),
        }
    }
}

pub fn final_status(hierarchy: &Hierarchy, roster: &Roster, id: PersonnelId) -> FinalStatus {
    if let Some(r) = roster.get(id) {
        return FinalStatus::Active {
            rank: hierarchy.label(r.rank).to_string(),
            supernumerary: r.supernumerary,
        };
    }
    roster
        .retired()
        .iter()
        .find(|rr| rr.record.id == id)
        .map_or(FinalStatus::NotInRoster, |rr| FinalStatus::Retired {
            rank: hierarchy.label(rr.record.rank).to_string(),
            on: rr.retired_on,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::PersonnelRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(id: u64, rank: usize, supernumerary: bool) -> PersonnelRecord {
        PersonnelRecord {
            id: PersonnelId(id),
            seniority: id,
            rank: Rank(rank),
            last_promotion: date(2020, 1, 1),
            admission: None,
            birth: None,
            supernumerary,
        }
    }

    #[test]
    fn clean_cycle_has_no_violations() {
        let h = Hierarchy::canonical();
        let mut roster = Roster::new(&h, vec![member(1, 0, false), member(2, 1, false)]).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        let d = date(2026, 6, 26);
        roster.promote(PersonnelId(1), Rank(1), false, d).unwrap();
        roster.retire(PersonnelId(2), d).unwrap();
        let mut violations = verify_vacancies(&h, d, &before, &roster);
        violations.extend(verify_movements(&h, d, &before, &roster));
        assert!(violations.is_empty(), "unexpected violations: {violations:?}");
    }

    #[test]
    fn detects_multi_rank_jump() {
        let h = Hierarchy::canonical();
        let mut roster = Roster::new(&h, vec![member(1, 0, false)]).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        let d = date(2026, 6, 26);
        roster.promote(PersonnelId(1), Rank(2), false, d).unwrap();
        let violations = verify_movements(&h, d, &before, &roster);
        assert!(
            violations.iter().any(|v| matches!(v, Violation::MultiRankJump { id: PersonnelId(1), .. })),
            "expected MultiRankJump, got: {violations:?}"
        );
    }

    #[test]
    fn detects_rank_decrease() {
        let h = Hierarchy::canonical();
        let mut roster = Roster::new(&h, vec![member(1, 3, false)]).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        let d = date(2026, 6, 26);
        roster.promote(PersonnelId(1), Rank(2), false, d).unwrap();
        let violations = verify_movements(&h, d, &before, &roster);
        assert!(
            violations.iter().any(|v| matches!(v, Violation::RankDecreased { .. })),
            "expected RankDecreased, got: {violations:?}"
        );
    }

    #[test]
    fn detects_rank_pushed_over_ceiling() {
        let h = Hierarchy::canonical();
        let ten_cel = h.rank_of("TEN CEL").unwrap();
        let maj = h.rank_of("MAJ").unwrap();
        let mut records: Vec<_> = (1..=3).map(|i| member(i, ten_cel.0, false)).collect();
        records.push(member(4, maj.0, false));
        let mut roster = Roster::new(&h, records).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        let d = date(2026, 6, 26);
        roster.promote(PersonnelId(4), ten_cel, false, d).unwrap();
        let violations = verify_vacancies(&h, d, &before, &roster);
        assert_eq!(
            violations,
            vec![Violation::VacancyExceeded { date: d, rank: "TEN CEL".to_string(), normal: 4, ceiling: 3 }]
        );
    }

    #[test]
    fn pre_existing_overfill_is_not_blamed_on_the_cycle() {
        let h = Hierarchy::canonical();
        let ten_cel = h.rank_of("TEN CEL").unwrap();
        let roster = Roster::new(&h, (1..=5).map(|i| member(i, ten_cel.0, false)).collect()).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        assert!(verify_vacancies(&h, date(2026, 6, 26), &before, &roster).is_empty());
    }

    #[test]
    fn detects_vanished_member() {
        let h = Hierarchy::canonical();
        let roster = Roster::new(&h, vec![member(1, 0, false)]).unwrap();
        let before = RankSnapshot::capture(&h, &roster);
        let empty = Roster::new(&h, vec![]).unwrap();
        let violations = verify_movements(&h, date(2026, 6, 26), &before, &empty);
        assert!(matches!(violations.as_slice(), [Violation::Vanished { id: PersonnelId(1), .. }]));
    }

    #[test]
    fn occupancy_reports_each_rank() {
        let h = Hierarchy::canonical();
        let roster = Roster::new(&h, vec![member(1, 1, false), member(2, 1, true), member(3, 11, false)]).unwrap();
        let occ = occupancy(&h, &roster);
        assert_eq!(occ.len(), h.len());
        assert_eq!(occ[1], RankOccupancy { rank: "CB".to_string(), normal: 1, supernumerary: 1, ceiling: Some(600) });
        assert_eq!(occ[1].open(), Some(599));
        assert_eq!(occ[11].open(), None);
    }

    #[test]
    fn final_status_covers_active_retired_and_unknown() {
        let h = Hierarchy::canonical();
        let mut roster = Roster::new(&h, vec![member(1, 1, true), member(2, 2, false)]).unwrap();
        let d = date(2030, 11, 29);
        roster.retire(PersonnelId(2), d).unwrap();

        let active = final_status(&h, &roster, PersonnelId(1));
        assert_eq!(active, FinalStatus::Active { rank: "CB".to_string(), supernumerary: true });
        assert_eq!(active.to_string(), "CB (supernumerary)");

        let retired = final_status(&h, &roster, PersonnelId(2));
        assert_eq!(retired, FinalStatus::Retired { rank: "3º SGT".to_string(), on: d });
        assert_eq!(retired.to_string(), "retired as 3º SGT on 29/11/2030");

        assert_eq!(final_status(&h, &roster, PersonnelId(9)), FinalStatus::NotInRoster);
    }
}
