use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::PersonnelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// Moved up one rank. `supernumerary` is set for time-based overflow promotions.
    Promoted { supernumerary: bool },
    /// Converted from an overflow slot to a regular vacancy at the same rank.
    Absorbed,
    Retired,
}

/// One entry in a traced member's career. `rank` is the destination rank for a
/// promotion and the rank held at the time for the other kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub id: PersonnelId,
    pub date: NaiveDate,
    pub kind: EventKind,
    pub rank: String,
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.format("%d/%m/%Y");
        match self.kind {
            EventKind::Promoted { supernumerary: false } => write!(f, "{date}: promoted to {}", self.rank),
            EventKind::Promoted { supernumerary: true } => {
                write!(f, "{date}: promoted to {} (supernumerary)", self.rank)
            }
            EventKind::Absorbed => write!(f, "{date}: took a regular vacancy in {}", self.rank),
            EventKind::Retired => write!(f, "{date}: retired as {}", self.rank),
        }
    }
}

/// Per-member event lists for the traced members only. Append-only while a run is in
/// progress.
#[derive(Debug, Clone, Default)]
pub struct History {
    traces: BTreeMap<PersonnelId, Vec<HistoryEvent>>,
    order: Vec<PersonnelId>,
}

impl History {
    /// Start an empty trace for each id, remembering the given order.
    pub fn traced(ids: &[PersonnelId]) -> Self {
        let mut history = History::default();
        for &id in ids {
            if history.traces.insert(id, Vec::new()).is_none() {
                history.order.push(id);
            }
        }
        history
    }

    /// Append an event if `id` is traced; untraced members are ignored.
    pub fn record(&mut self, id: PersonnelId, date: NaiveDate, kind: EventKind, rank: &str) {
        if let Some(events) = self.traces.get_mut(&id) {
            events.push(HistoryEvent { id, date, kind, rank: rank.to_string() });
        }
    }

    /// Events for a traced member, oldest first. Empty for a traced member with no
    /// events; `None` only for members that were never traced.
    pub fn events_for(&self, id: PersonnelId) -> Option<&[HistoryEvent]> {
        self.traces.get(&id).map(Vec::as_slice)
    }

    /// Traced ids in the order they were requested.
    pub fn ids(&self) -> &[PersonnelId] {
        &self.order
    }

    /// All traces in requested order.
    pub fn iter(&self) -> impl Iterator<Item = (PersonnelId, &[HistoryEvent])> {
        self.order
            .iter()
            .map(|id| (*id, self.traces.get(id).map(Vec::as_slice).unwrap_or_default()))
    }

    /// Every recorded event across all traces, ordered by date then by trace order.
    pub fn all_events(&self) -> Vec<&HistoryEvent> {
        let mut events: Vec<&HistoryEvent> = self.iter().flat_map(|(_, evs)| evs.iter()).collect();
        events.sort_by_key(|e| e.date);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn traced_members_start_with_empty_lists() {
        let h = History::traced(&[PersonnelId(3), PersonnelId(1)]);
        assert_eq!(h.events_for(PersonnelId(3)), Some(&[][..]));
        assert_eq!(h.events_for(PersonnelId(2)), None);
        assert_eq!(h.ids(), &[PersonnelId(3), PersonnelId(1)]);
    }

    #[test]
    fn untraced_events_are_dropped() {
        let mut h = History::traced(&[PersonnelId(1)]);
        h.record(PersonnelId(2), date(2026, 6, 26), EventKind::Retired, "CB");
        assert!(h.all_events().is_empty());
    }

    #[test]
    fn events_append_in_order() {
        let mut h = History::traced(&[PersonnelId(1)]);
        h.record(PersonnelId(1), date(2026, 6, 26), EventKind::Promoted { supernumerary: true }, "3º SGT");
        h.record(PersonnelId(1), date(2026, 11, 29), EventKind::Absorbed, "3º SGT");
        let kinds: Vec<_> = h.events_for(PersonnelId(1)).unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Promoted { supernumerary: true }, EventKind::Absorbed]);
    }

    #[test]
    fn repeated_ids_are_traced_once() {
        let h = History::traced(&[PersonnelId(1), PersonnelId(1)]);
        assert_eq!(h.ids(), &[PersonnelId(1)]);
    }

    #[test]
    fn display_is_human_readable() {
        let ev = |kind| HistoryEvent { id: PersonnelId(1), date: date(2027, 6, 26), kind, rank: "CB".to_string() };
        assert_eq!(ev(EventKind::Promoted { supernumerary: false }).to_string(), "26/06/2027: promoted to CB");
        assert_eq!(
            ev(EventKind::Promoted { supernumerary: true }).to_string(),
            "26/06/2027: promoted to CB (supernumerary)"
        );
        assert_eq!(ev(EventKind::Absorbed).to_string(), "26/06/2027: took a regular vacancy in CB");
        assert_eq!(ev(EventKind::Retired).to_string(), "26/06/2027: retired as CB");
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let ev = HistoryEvent {
            id: PersonnelId(4),
            date: date(2027, 11, 29),
            kind: EventKind::Absorbed,
            rank: "CAP".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"id":4,"date":"2027-11-29","kind":"Absorbed","rank":"CAP"}"#);
    }

    #[test]
    fn all_events_merge_by_date() {
        let mut h = History::traced(&[PersonnelId(1), PersonnelId(2)]);
        h.record(PersonnelId(1), date(2027, 6, 26), EventKind::Retired, "CB");
        h.record(PersonnelId(2), date(2026, 6, 26), EventKind::Absorbed, "CB");
        let ids: Vec<_> = h.all_events().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![PersonnelId(2), PersonnelId(1)]);
    }
}
