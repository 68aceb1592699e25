use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::absorption;
use crate::analysis::{self, RankSnapshot, Violation};
use crate::calendar::CycleSchedule;
use crate::config::{Hierarchy, RunParams};
use crate::error::{ConfigError, ParamError, SimError};
use crate::history::History;
use crate::promotion;
use crate::retirement::{self, RetirementRule};
use crate::roster::{PersonnelRecord, RetiredRecord, Roster};

/// What happened on one cycle date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub promoted: usize,
    pub overflow_promoted: usize,
    pub absorbed: usize,
    pub retired: usize,
    /// Active head count once the cycle is over.
    pub active: usize,
}

/// Final state of a finished run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub roster: Roster,
    pub history: History,
    pub cycles: Vec<CycleReport>,
    pub violations: Vec<Violation>,
}

impl Outcome {
    pub fn active(&self) -> &[PersonnelRecord] {
        self.roster.active()
    }

    pub fn retired(&self) -> &[RetiredRecord] {
        self.roster.retired()
    }
}

/// Owns the roster for the length of a run and applies the three passes, in order,
/// on every cycle date.
pub struct Simulation {
    hierarchy: Hierarchy,
    params: RunParams,
    rule: RetirementRule,
    pub roster: Roster,
    pub history: History,
    /// One entry per completed cycle, in date order.
    pub log: Vec<CycleReport>,
    pub violations: Vec<Violation>,
    check_invariants: bool,
}

impl Simulation {
    /// Validate parameters and roster against each other. Nothing runs if this fails.
    pub fn new(hierarchy: Hierarchy, roster: Roster, params: RunParams) -> Result<Self, SimError> {
        params.validate()?;
        for &id in &params.traced {
            if !roster.contains(id) {
                return Err(ParamError::UnknownTracedId(id).into());
            }
        }
        for r in roster.active() {
            if r.last_promotion > params.start_date {
                return Err(ConfigError::PromotionInFuture {
                    id: r.id,
                    date: r.last_promotion,
                    start: params.start_date,
                }
                .into());
            }
        }

        Ok(Simulation {
            rule: RetirementRule::new(params.retirement_threshold),
            history: History::traced(&params.traced),
            hierarchy,
            params,
            roster,
            log: Vec::new(),
            violations: Vec::new(),
            check_invariants: false,
        })
    }

    /// Check the vacancy, ownership and rank-movement invariants after every cycle.
    pub fn with_invariant_checks(mut self) -> Self {
        self.check_invariants = true;
        self
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn schedule(&self) -> CycleSchedule {
        self.params.schedule()
    }

    /// Run every scheduled cycle. Stops at the first failing cycle.
    pub fn run(&mut self) -> Result<(), SimError> {
        let schedule = self.schedule();
        info!(
            start = %schedule.start(),
            target = %schedule.target(),
            active = self.roster.len(),
            "simulation started"
        );
        for date in &schedule {
            self.step(date)?;
        }
        info!(
            cycles = self.log.len(),
            active = self.roster.len(),
            retired = self.roster.retired().len(),
            "simulation finished"
        );
        Ok(())
    }

    /// Promotion, then absorption, then retirement for a single cycle date.
    pub fn step(&mut self, date: NaiveDate) -> Result<CycleReport, SimError> {
        let before = self
            .check_invariants
            .then(|| RankSnapshot::capture(&self.hierarchy, &self.roster));

        let promoted = promotion::run(&mut self.roster, &self.hierarchy, date, &mut self.history)?;
        let absorbed = absorption::run(&mut self.roster, &self.hierarchy, date, &mut self.history)?;
        if let Some(before) = &before {
            let found = analysis::verify_vacancies(&self.hierarchy, date, before, &self.roster);
            self.record_violations(found);
        }
        let retired = retirement::run(&mut self.roster, &self.hierarchy, self.rule, date, &mut self.history)?;
        if let Some(before) = &before {
            let found = analysis::verify_movements(&self.hierarchy, date, before, &self.roster);
            self.record_violations(found);
        }

        let report = CycleReport {
            date,
            promoted: promoted.total(),
            overflow_promoted: promoted.overflow,
            absorbed,
            retired,
            active: self.roster.len(),
        };
        info!(
            date = %date,
            promoted = report.promoted,
            overflow = report.overflow_promoted,
            absorbed,
            retired,
            "cycle complete"
        );
        self.log.push(report);
        Ok(report)
    }

    fn record_violations(&mut self, found: Vec<Violation>) {
        for v in &found {
            warn!(violation = %v, "invariant violated");
        }
        self.violations.extend(found);
    }

    pub fn into_outcome(self) -> Outcome {
        Outcome {
            roster: self.roster,
            history: self.history,
            cycles: self.log,
            violations: self.violations,
        }
    }
}

/// Validate, run every cycle and hand back the final state.
pub fn simulate(hierarchy: Hierarchy, roster: Roster, params: RunParams) -> Result<Outcome, SimError> {
    let mut sim = Simulation::new(hierarchy, roster, params)?;
    sim.run()?;
    Ok(sim.into_outcome())
}
