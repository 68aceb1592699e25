use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::calendar::parse_date;
use crate::config::Hierarchy;
use crate::error::{ConfigError, SimError};
use crate::types::{PersonnelId, Rank, SeniorityKey};

/// One active member of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonnelRecord {
    pub id: PersonnelId,
    /// Lower is more senior within the current rank.
    pub seniority: u64,
    pub rank: Rank,
    pub last_promotion: NaiveDate,
    pub admission: Option<NaiveDate>,
    pub birth: Option<NaiveDate>,
    /// Occupies an overflow slot that does not count against the rank's ceiling.
    pub supernumerary: bool,
}

impl PersonnelRecord {
    pub fn key(&self) -> SeniorityKey {
        SeniorityKey { seniority: self.seniority, id: self.id }
    }
}

/// A record moved out of the active roster, tagged with its effective date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetiredRecord {
    #[serde(flatten)]
    pub record: PersonnelRecord,
    pub retired_on: NaiveDate,
}

/// Spreadsheet marker for an overflow occupant: a boolean or the text `"x"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFlag")]
pub struct SupernumeraryFlag(pub bool);

impl From<RawFlag> for SupernumeraryFlag {
    fn from(raw: RawFlag) -> Self {
        match raw {
            RawFlag::Bool(b) => SupernumeraryFlag(b),
            RawFlag::Text(s) => SupernumeraryFlag(s.trim().eq_ignore_ascii_case("x")),
        }
    }
}

/// Seniority cell as exported from a spreadsheet: an integer, a float or numeric text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeniority {
    Int(u64),
    Float(f64),
    Text(String),
}

/// Accept whole non-negative numbers in any of the spreadsheet encodings (`7`, `7.0`,
/// `" 7 "`). Fractional, negative, blank or non-numeric cells are rejected.
fn seniority_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = match RawSeniority::deserialize(deserializer)? {
        RawSeniority::Int(n) => return Ok(n),
        RawSeniority::Float(f) => f,
        RawSeniority::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("seniority {s:?} is not a number")))?,
    };
    if value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(D::Error::custom(format!("seniority {value} is not a whole non-negative number")))
    }
}

/// A roster row as it arrives from the loader, before ranks and dates are resolved.
///
/// `seniority` must be a whole non-negative number; it may arrive as an integer, a
/// float with no fractional part or numeric text. Any other value fails the load,
/// since a row without a usable seniority cannot be placed in promotion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PersonnelId,
    pub rank: String,
    #[serde(deserialize_with = "seniority_number")]
    pub seniority: u64,
    #[serde(default)]
    pub last_promotion: Option<String>,
    #[serde(default)]
    pub admission: Option<String>,
    #[serde(default)]
    pub birth: Option<String>,
    #[serde(default)]
    pub supernumerary: Option<SupernumeraryFlag>,
}

impl RosterEntry {
    /// Resolve the rank label and dates. Unreadable birth or admission dates become `None`;
    /// a missing last promotion date falls back to the admission date.
    pub fn resolve(&self, hierarchy: &Hierarchy) -> Result<PersonnelRecord, ConfigError> {
        let rank = hierarchy.rank_of(&self.rank).ok_or_else(|| ConfigError::UnknownRank {
            id: self.id,
            label: self.rank.clone(),
        })?;
        let admission = self.admission.as_deref().and_then(parse_date);
        let birth = self.birth.as_deref().and_then(parse_date);
        let last_promotion = self
            .last_promotion
            .as_deref()
            .and_then(parse_date)
            .or(admission)
            .ok_or(ConfigError::MissingPromotionDate(self.id))?;

        Ok(PersonnelRecord {
            id: self.id,
            seniority: self.seniority,
            rank,
            last_promotion,
            admission,
            birth,
            supernumerary: self.supernumerary.unwrap_or_default().0,
        })
    }
}

/// Active personnel plus the append-only retired collection.
///
/// Active records keep their load order. Per-rank membership is kept in seniority
/// order and normal-occupant counts are maintained on every mutation, so
/// `count_normal_at` always reflects the live state.
#[derive(Debug, Clone)]
pub struct Roster {
    active: Vec<PersonnelRecord>,
    index: HashMap<PersonnelId, usize>,
    members: Vec<BTreeSet<SeniorityKey>>,
    normal_counts: Vec<usize>,
    retired: Vec<RetiredRecord>,
    retired_ids: HashSet<PersonnelId>,
}

impl Roster {
    pub fn new(hierarchy: &Hierarchy, records: Vec<PersonnelRecord>) -> Result<Self, ConfigError> {
        let mut roster = Roster {
            active: Vec::with_capacity(records.len()),
            index: HashMap::with_capacity(records.len()),
            members: vec![BTreeSet::new(); hierarchy.len()],
            normal_counts: vec![0; hierarchy.len()],
            retired: Vec::new(),
            retired_ids: HashSet::new(),
        };
        for record in records {
            if record.rank.0 >= hierarchy.len() {
                return Err(ConfigError::UnknownRank {
                    id: record.id,
                    label: format!("#{}", record.rank.0),
                });
            }
            if roster.index.contains_key(&record.id) {
                return Err(ConfigError::DuplicateId(record.id));
            }
            roster.members[record.rank.0].insert(record.key());
            if !record.supernumerary {
                roster.normal_counts[record.rank.0] += 1;
            }
            roster.index.insert(record.id, roster.active.len());
            roster.active.push(record);
        }
        Ok(roster)
    }

    pub fn from_entries(hierarchy: &Hierarchy, entries: &[RosterEntry]) -> Result<Self, ConfigError> {
        let records = entries
            .iter()
            .map(|e| e.resolve(hierarchy))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(hierarchy, records)
    }

    /// Parse a JSON array of roster rows.
    pub fn from_json_str(hierarchy: &Hierarchy, data: &str) -> Result<Self, ConfigError> {
        let entries: Vec<RosterEntry> = serde_json::from_str(data)
            .map_err(|source| ConfigError::Parse { what: "roster", source })?;
        Self::from_entries(hierarchy, &entries)
    }

    pub fn read_from_file(hierarchy: &Hierarchy, path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(hierarchy, &contents)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> &[PersonnelRecord] {
        &self.active
    }

    pub fn retired(&self) -> &[RetiredRecord] {
        &self.retired
    }

    pub fn get(&self, id: PersonnelId) -> Option<&PersonnelRecord> {
        self.index.get(&id).map(|&i| &self.active[i])
    }

    pub fn contains(&self, id: PersonnelId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_retired(&self, id: PersonnelId) -> bool {
        self.retired_ids.contains(&id)
    }

    pub fn count_at(&self, rank: Rank) -> usize {
        self.members[rank.0].len()
    }

    pub fn count_normal_at(&self, rank: Rank) -> usize {
        self.normal_counts[rank.0]
    }

    pub fn count_supernumerary_at(&self, rank: Rank) -> usize {
        self.count_at(rank) - self.count_normal_at(rank)
    }

    /// Everyone currently at `rank`, most senior first. A snapshot: later mutations
    /// do not change the returned list.
    pub fn candidates_at(&self, rank: Rank) -> Vec<PersonnelId> {
        self.members[rank.0].iter().map(|k| k.id).collect()
    }

    /// Supernumerary occupants of `rank`, most senior first.
    pub fn supernumeraries_at(&self, rank: Rank) -> Vec<PersonnelId> {
        self.members[rank.0]
            .iter()
            .filter(|k| self.index.get(&k.id).is_some_and(|&i| self.active[i].supernumerary))
            .map(|k| k.id)
            .collect()
    }

    fn slot(&self, id: PersonnelId) -> Result<usize, SimError> {
        self.index.get(&id).copied().ok_or(SimError::UnknownPersonnel(id))
    }

    /// Move a record to `to`, restarting its time in rank on `date`.
    pub fn promote(
        &mut self,
        id: PersonnelId,
        to: Rank,
        as_supernumerary: bool,
        date: NaiveDate,
    ) -> Result<(), SimError> {
        let i = self.slot(id)?;
        let record = &mut self.active[i];
        let key = record.key();

        self.members[record.rank.0].remove(&key);
        if !record.supernumerary {
            self.normal_counts[record.rank.0] -= 1;
        }

        record.rank = to;
        record.last_promotion = date;
        record.supernumerary = as_supernumerary;

        self.members[to.0].insert(key);
        if !as_supernumerary {
            self.normal_counts[to.0] += 1;
        }
        Ok(())
    }

    /// Convert a supernumerary occupant to normal status at the same rank.
    /// Returns `false` if the record was already a normal occupant.
    pub fn absorb(&mut self, id: PersonnelId) -> Result<bool, SimError> {
        let i = self.slot(id)?;
        let record = &mut self.active[i];
        if !record.supernumerary {
            return Ok(false);
        }
        record.supernumerary = false;
        self.normal_counts[record.rank.0] += 1;
        Ok(true)
    }

    pub fn retire(&mut self, id: PersonnelId, date: NaiveDate) -> Result<(), SimError> {
        self.retire_many(&[id], date)
    }

    /// Move every listed record to the retired collection with the same effective date.
    /// Either all of them move or, if any id is unknown, none do.
    pub fn retire_many(&mut self, ids: &[PersonnelId], date: NaiveDate) -> Result<(), SimError> {
        let mut leaving = HashSet::with_capacity(ids.len());
        for &id in ids {
            self.slot(id)?;
            leaving.insert(id);
        }
        if leaving.is_empty() {
            return Ok(());
        }

        let active = std::mem::take(&mut self.active);
        self.active.reserve(active.len() - leaving.len());
        for record in active {
            if !leaving.contains(&record.id) {
                self.active.push(record);
                continue;
            }
            self.members[record.rank.0].remove(&record.key());
            if !record.supernumerary {
                self.normal_counts[record.rank.0] -= 1;
            }
            self.retired_ids.insert(record.id);
            self.retired.push(RetiredRecord { record, retired_on: date });
        }

        self.index.clear();
        for (i, record) in self.active.iter().enumerate() {
            self.index.insert(record.id, i);
        }
        Ok(())
    }
}

const DAYS_PER_YEAR: f64 = 365.25;

fn years_before(date: NaiveDate, years: f64) -> NaiveDate {
    let days = (years.max(0.0) * DAYS_PER_YEAR) as u64;
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// Deterministic synthetic roster: up to `per_rank` normal occupants per rank (capped
/// by the rank's ceiling), with ages drawn around a rank-dependent mean.
pub fn synthetic(hierarchy: &Hierarchy, per_rank: usize, start: NaiveDate, seed: u64) -> Vec<PersonnelRecord> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut records = Vec::new();
    let mut next_id = 1u64;

    for rank in hierarchy.ranks() {
        let n = hierarchy.vacancy_ceiling(rank).map_or(per_rank, |c| c.min(per_rank));
        let mean_age = 24.0 + 2.5 * rank.0 as f64;
        let ages = Normal::new(mean_age, 4.0).expect("invalid Normal params");

        for seniority in 1..=n as u64 {
            let age = ages.sample(&mut rng).clamp(18.0, 62.5);
            let entry_age = rng.random_range(18.0..=age.min(30.0));
            let service = age - entry_age;
            let in_rank = rng.random_range(0.0..=service.min(9.0));

            records.push(PersonnelRecord {
                id: PersonnelId(next_id),
                seniority,
                rank,
                last_promotion: years_before(start, in_rank),
                admission: Some(years_before(start, service)),
                birth: Some(years_before(start, age)),
                supernumerary: false,
            });
            next_id += 1;
        }
    }
    records
}
