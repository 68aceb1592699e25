use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::calendar::whole_years;
use crate::config::{Hierarchy, OVERFLOW_YEARS};
use crate::error::SimError;
use crate::history::{EventKind, History};
use crate::roster::{PersonnelRecord, Roster};
use crate::types::Rank;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionSummary {
    /// Promotions into a counted vacancy.
    pub ordinary: usize,
    /// Time-based promotions into an overflow slot.
    pub overflow: usize,
}

impl PromotionSummary {
    pub fn total(&self) -> usize {
        self.ordinary + self.overflow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Overflow,
    Ordinary,
    Stay,
}

/// Apply the two promotion rules to one candidate against the live roster state.
fn decide(
    record: &PersonnelRecord,
    above: Rank,
    date: NaiveDate,
    hierarchy: &Hierarchy,
    roster: &Roster,
) -> Decision {
    let years_in_rank = whole_years(record.last_promotion, date);

    if hierarchy.is_supernumerary_eligible(record.rank) && years_in_rank >= OVERFLOW_YEARS {
        return Decision::Overflow;
    }

    let min_years = hierarchy.min_years_in_rank(record.rank) as i32;
    if years_in_rank >= min_years && hierarchy.has_vacancy(above, roster.count_normal_at(above)) {
        Decision::Ordinary
    } else {
        Decision::Stay
    }
}

/// Run the promotion pass for one cycle date.
///
/// Ranks are visited from the second highest down to the lowest, so nobody moves more
/// than one rank per cycle. Inside a rank, candidates are taken from a seniority-ordered
/// snapshot, while the vacancy count of the rank above is re-read for every candidate:
/// each ordinary promotion shrinks what is left for the next one.
pub fn run(
    roster: &mut Roster,
    hierarchy: &Hierarchy,
    date: NaiveDate,
    history: &mut History,
) -> Result<PromotionSummary, SimError> {
    let mut summary = PromotionSummary::default();

    for rank in hierarchy.ranks().rev() {
        let Some(above) = hierarchy.rank_above(rank) else {
            continue;
        };

        for id in roster.candidates_at(rank) {
            let record = roster.get(id).ok_or(SimError::UnknownPersonnel(id))?;
            let supernumerary = match decide(record, above, date, hierarchy, roster) {
                Decision::Overflow => true,
                Decision::Ordinary => false,
                Decision::Stay => continue,
            };

            roster.promote(id, above, supernumerary, date)?;
            if supernumerary {
                summary.overflow += 1;
            } else {
                summary.ordinary += 1;
            }
            debug!(
                id = %id,
                from = hierarchy.label(rank),
                to = hierarchy.label(above),
                supernumerary,
                "promoted"
            );
            history.record(id, date, EventKind::Promoted { supernumerary }, hierarchy.label(above));
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HierarchyLevel;
    use crate::types::PersonnelId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cycle() -> NaiveDate {
        date(2026, 6, 26)
    }

    fn level(label: &str, ceiling: Option<usize>, min: Option<u32>, overflow: bool) -> HierarchyLevel {
        HierarchyLevel {
            label: label.to_string(),
            vacancy_ceiling: ceiling,
            min_years_in_rank: min,
            supernumerary_eligible: overflow,
        }
    }

    /// A(10, 2y, overflow) → B(1, 2y, overflow) → C(1, 3y) → D(top)
    fn ladder() -> Hierarchy {
        Hierarchy::new(vec![
            level("A", Some(10), Some(2), true),
            level("B", Some(1), Some(2), true),
            level("C", Some(1), Some(3), false),
            level("D", None, None, false),
        ])
        .unwrap()
    }

    fn member(id: u64, seniority: u64, rank: usize, years_in_rank: i32) -> PersonnelRecord {
        PersonnelRecord {
            id: PersonnelId(id),
            seniority,
            rank: Rank(rank),
            last_promotion: date(2026 - years_in_rank, 6, 26),
            admission: Some(date(2000, 1, 1)),
            birth: Some(date(1980, 1, 1)),
            supernumerary: false,
        }
    }

    fn run_once(h: &Hierarchy, records: Vec<PersonnelRecord>, traced: &[PersonnelId]) -> (Roster, History, PromotionSummary) {
        let mut roster = Roster::new(h, records).unwrap();
        let mut history = History::traced(traced);
        let summary = run(&mut roster, h, cycle(), &mut history).unwrap();
        (roster, history, summary)
    }

    #[test]
    fn overflow_promotes_into_a_full_rank() {
        let h = ladder();
        // B is full (ceiling 1) with one normal occupant.
        let records = vec![member(1, 1, 0, 6), member(2, 1, 1, 0)];
        let (roster, history, summary) = run_once(&h, records, &[PersonnelId(1)]);

        let r = roster.get(PersonnelId(1)).unwrap();
        assert_eq!(r.rank, Rank(1));
        assert!(r.supernumerary);
        assert_eq!(r.last_promotion, cycle());
        assert_eq!(summary, PromotionSummary { ordinary: 0, overflow: 1 });
        assert_eq!(roster.count_normal_at(Rank(1)), 1, "overflow does not take a counted slot");

        let events = history.events_for(PersonnelId(1)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Promoted { supernumerary: true });
        assert_eq!(events[0].rank, "B");
    }

    #[test]
    fn five_years_is_not_enough_for_overflow() {
        let h = ladder();
        let records = vec![member(1, 1, 0, 5), member(2, 1, 1, 0)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(0));
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn overflow_requires_an_eligible_rank() {
        let h = ladder();
        // C is not overflow-eligible and D has no ceiling, so ordinary applies instead.
        let records = vec![member(1, 1, 2, 10)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        let r = roster.get(PersonnelId(1)).unwrap();
        assert_eq!(r.rank, Rank(3));
        assert!(!r.supernumerary);
        assert_eq!(summary, PromotionSummary { ordinary: 1, overflow: 0 });
    }

    #[test]
    fn ordinary_promotion_needs_minimum_time() {
        let h = ladder();
        let records = vec![member(1, 1, 0, 1)];
        let (roster, _, _) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(0));
    }

    #[test]
    fn live_recount_lets_only_the_most_senior_take_the_last_vacancy() {
        let h = ladder();
        // B has one open slot; two eligible A members, seniority decides.
        let records = vec![member(1, 2, 0, 3), member(2, 1, 0, 3)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(2)).unwrap().rank, Rank(1));
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(0));
        assert_eq!(summary.ordinary, 1);
    }

    #[test]
    fn overflow_does_not_consume_the_vacancy() {
        let h = ladder();
        // Senior member overflows (6y), junior still finds B's single slot open.
        let records = vec![member(1, 1, 0, 6), member(2, 2, 0, 2)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        let senior = roster.get(PersonnelId(1)).unwrap();
        let junior = roster.get(PersonnelId(2)).unwrap();
        assert_eq!((senior.rank, senior.supernumerary), (Rank(1), true));
        assert_eq!((junior.rank, junior.supernumerary), (Rank(1), false));
        assert_eq!(summary, PromotionSummary { ordinary: 1, overflow: 1 });
    }

    #[test]
    fn nobody_climbs_two_ranks_in_one_pass() {
        let h = ladder();
        // Member 1 qualifies for A→B; once at B it would also qualify for B→C by time,
        // but B was processed before A.
        let records = vec![member(1, 1, 0, 10)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(1));
        assert_eq!(summary.total(), 1);
    }

    #[test]
    fn higher_rank_departures_open_slots_for_lower_ranks_in_the_same_pass() {
        let h = ladder();
        // B's occupant moves to C (C has room), freeing B for the A candidate.
        let records = vec![member(1, 1, 1, 2), member(2, 1, 0, 2)];
        let (roster, _, summary) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(2));
        assert_eq!(roster.get(PersonnelId(2)).unwrap().rank, Rank(1));
        assert_eq!(summary.ordinary, 2);
    }

    #[test]
    fn supernumerary_promoted_ordinarily_becomes_normal() {
        let h = ladder();
        let mut senior = member(1, 1, 1, 2);
        senior.supernumerary = true;
        let (roster, _, _) = run_once(&h, vec![senior], &[PersonnelId(1)]);
        let r = roster.get(PersonnelId(1)).unwrap();
        assert_eq!(r.rank, Rank(2));
        assert!(!r.supernumerary);
        assert_eq!(roster.count_normal_at(Rank(2)), 1);
    }

    #[test]
    fn top_rank_is_never_promoted() {
        let h = ladder();
        let records = vec![member(1, 1, 3, 40)];
        let (roster, history, summary) = run_once(&h, records, &[PersonnelId(1)]);
        assert_eq!(roster.get(PersonnelId(1)).unwrap().rank, Rank(3));
        assert_eq!(summary.total(), 0);
        assert!(history.events_for(PersonnelId(1)).unwrap().is_empty());
    }

    #[test]
    fn untraced_promotions_leave_no_history() {
        let h = ladder();
        let records = vec![member(1, 1, 0, 6), member(2, 2, 0, 0)];
        let (_, history, summary) = run_once(&h, records, &[PersonnelId(2)]);
        assert_eq!(summary.overflow, 1);
        assert!(history.events_for(PersonnelId(2)).unwrap().is_empty());
    }
}
