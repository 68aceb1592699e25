use serde::{Deserialize, Serialize};

/// Registration number of one member of the roster. Stable for the record's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonnelId(pub u64);

impl std::fmt::Display for PersonnelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position on the rank ladder. `Rank(0)` is the lowest rank; higher indices are
/// more senior. Labels live in [`crate::config::Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(pub usize);

impl Rank {
    /// The rank directly above this one, without checking the ladder height.
    pub fn next(self) -> Self {
        Rank(self.0 + 1)
    }
}

/// Ordering key inside a rank: lower seniority number first, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeniorityKey {
    pub seniority: u64,
    pub id: PersonnelId,
}
