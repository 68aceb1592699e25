use std::collections::HashMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::CycleSchedule;
use crate::error::{ConfigError, ParamError};
use crate::types::{PersonnelId, Rank};

/// Whole years in an overflow-eligible rank after which promotion ignores vacancies.
pub const OVERFLOW_YEARS: i32 = 6;
/// Age at which anyone still active is retired.
pub const RETIREMENT_AGE: i32 = 63;
pub const RETIREMENT_THRESHOLD_RANGE: RangeInclusive<u32> = 31..=35;
pub const DEFAULT_RETIREMENT_THRESHOLD: u32 = 35;
pub const MAX_TRACED: usize = 5;

/// Latest target date a run may be asked to reach.
pub fn target_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2060, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub label: String,
    /// Maximum normal-status occupants. `None` only for the top rank.
    pub vacancy_ceiling: Option<usize>,
    /// Whole years in this rank before an ordinary promotion. `None` only for the top rank.
    pub min_years_in_rank: Option<u32>,
    #[serde(default)]
    pub supernumerary_eligible: bool,
}

impl HierarchyLevel {
    fn new(label: &str, ceiling: Option<usize>, min_years: Option<u32>, overflow: bool) -> Self {
        HierarchyLevel {
            label: label.to_string(),
            vacancy_ceiling: ceiling,
            min_years_in_rank: min_years,
            supernumerary_eligible: overflow,
        }
    }
}

#[derive(Deserialize)]
struct HierarchyFile {
    levels: Vec<HierarchyLevel>,
}

/// The rank ladder, lowest rank first. Immutable once built.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    levels: Vec<HierarchyLevel>,
    by_label: HashMap<String, Rank>,
}

impl Hierarchy {
    /// Validate and build a ladder from its levels, lowest first.
    pub fn new(levels: Vec<HierarchyLevel>) -> Result<Self, ConfigError> {
        let Some((top, below)) = levels.split_last() else {
            return Err(ConfigError::EmptyLadder);
        };
        for level in below {
            if level.vacancy_ceiling.is_none() {
                return Err(ConfigError::MissingCeiling(level.label.clone()));
            }
            if level.min_years_in_rank.is_none() {
                return Err(ConfigError::MissingMinYears(level.label.clone()));
            }
        }
        if top.supernumerary_eligible {
            return Err(ConfigError::OverflowAtTop(top.label.clone()));
        }

        let mut by_label = HashMap::with_capacity(levels.len());
        for (i, level) in levels.iter().enumerate() {
            let label = level.label.trim().to_string();
            if by_label.insert(label, Rank(i)).is_some() {
                return Err(ConfigError::DuplicateRank(level.label.clone()));
            }
        }
        Ok(Hierarchy { levels, by_label })
    }

    /// The fire brigade ladder the simulator was built for.
    pub fn canonical() -> Self {
        // label, ceiling, minimum years in rank, overflow-eligible
        let levels = vec![
            HierarchyLevel::new("SD 1", Some(600), Some(5), false),
            HierarchyLevel::new("CB", Some(600), Some(3), true),
            HierarchyLevel::new("3º SGT", Some(573), Some(3), true),
            HierarchyLevel::new("2º SGT", Some(409), Some(3), true),
            HierarchyLevel::new("1º SGT", Some(245), Some(2), false),
            HierarchyLevel::new("SUB TEN", Some(96), Some(2), false),
            HierarchyLevel::new("2º TEN", Some(34), Some(3), true),
            HierarchyLevel::new("1º TEN", Some(29), Some(3), true),
            HierarchyLevel::new("CAP", Some(24), Some(3), true),
            HierarchyLevel::new("MAJ", Some(10), Some(3), false),
            HierarchyLevel::new("TEN CEL", Some(3), Some(30), false),
            HierarchyLevel::new("CEL", None, None, false),
        ];
        let by_label = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.label.clone(), Rank(i)))
            .collect();
        Hierarchy { levels, by_label }
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let file: HierarchyFile = serde_json::from_str(data)
            .map_err(|source| ConfigError::Parse { what: "hierarchy", source })?;
        Self::new(file.levels)
    }

    pub fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.levels
    }

    /// All ranks, lowest first.
    pub fn ranks(&self) -> impl DoubleEndedIterator<Item = Rank> + ExactSizeIterator + use<> {
        (0..self.levels.len()).map(Rank)
    }

    pub fn top(&self) -> Rank {
        Rank(self.levels.len() - 1)
    }

    pub fn rank_of(&self, label: &str) -> Option<Rank> {
        self.by_label.get(label.trim()).copied()
    }

    pub fn label(&self, rank: Rank) -> &str {
        &self.levels[rank.0].label
    }

    pub fn rank_above(&self, rank: Rank) -> Option<Rank> {
        let next = rank.next();
        (next.0 < self.levels.len()).then_some(next)
    }

    pub fn vacancy_ceiling(&self, rank: Rank) -> Option<usize> {
        self.levels[rank.0].vacancy_ceiling
    }

    /// Zero for the top rank, which is never promoted from.
    pub fn min_years_in_rank(&self, rank: Rank) -> u32 {
        self.levels[rank.0].min_years_in_rank.unwrap_or(0)
    }

    pub fn is_supernumerary_eligible(&self, rank: Rank) -> bool {
        self.levels[rank.0].supernumerary_eligible
    }

    /// Whether a rank holding `normal_count` normal occupants can take one more.
    pub fn has_vacancy(&self, rank: Rank, normal_count: usize) -> bool {
        self.vacancy_ceiling(rank).is_none_or(|ceiling| normal_count < ceiling)
    }

    /// Open normal slots at a rank; `usize::MAX` when the rank has no ceiling.
    pub fn open_slots(&self, rank: Rank, normal_count: usize) -> usize {
        match self.vacancy_ceiling(rank) {
            Some(ceiling) => ceiling.saturating_sub(normal_count),
            None => usize::MAX,
        }
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    /// Years of service after which a member retires.
    pub retirement_threshold: u32,
    /// Members whose careers are recorded event by event, in display order.
    pub traced: Vec<PersonnelId>,
}

impl RunParams {
    pub fn new(start_date: NaiveDate, target_date: NaiveDate) -> Self {
        RunParams {
            start_date,
            target_date,
            retirement_threshold: DEFAULT_RETIREMENT_THRESHOLD,
            traced: Vec::new(),
        }
    }

    pub fn with_retirement_threshold(mut self, years: u32) -> Self {
        self.retirement_threshold = years;
        self
    }

    /// Set the traced members, dropping repeats but keeping first-seen order.
    pub fn with_traced(mut self, ids: impl IntoIterator<Item = PersonnelId>) -> Self {
        self.traced.clear();
        for id in ids {
            if !self.traced.contains(&id) {
                self.traced.push(id);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.target_date < self.start_date {
            return Err(ParamError::TargetBeforeStart {
                start: self.start_date,
                target: self.target_date,
            });
        }
        let cutoff = target_cutoff();
        if self.target_date > cutoff {
            return Err(ParamError::TargetBeyondCutoff { target: self.target_date, cutoff });
        }
        if !RETIREMENT_THRESHOLD_RANGE.contains(&self.retirement_threshold) {
            return Err(ParamError::ThresholdOutOfRange(self.retirement_threshold));
        }
        if self.traced.is_empty() || self.traced.len() > MAX_TRACED {
            return Err(ParamError::TraceSetSize(self.traced.len()));
        }
        Ok(())
    }

    pub fn schedule(&self) -> CycleSchedule {
        CycleSchedule::new(self.start_date, self.target_date)
    }
}
