use crate::error::Refusal;
use crate::grid::{Component, GeneratorType};
use crate::standards::BlackstartStandards;
use std::fmt;

/// Residual demand below which a load counts as fully restored (MW).
const PICKUP_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackstartState {
    Idle,
    Assessing,
    Sequencing,
    Restoring,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorationAction {
    StartBlackstartUnit,
    StartGenerator,
    RestoreLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestorationPhase {
    BlackstartUnits,
    GenerationRestoration,
    LoadRestoration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestorationStep {
    pub index: usize,
    pub component_id: String,
    pub action: RestorationAction,
    /// Minutes after the blackout.
    pub time_offset: f64,
    pub phase: RestorationPhase,
    /// Generation started or load picked up in this step (MW).
    pub power_mw: f64,
}

impl fmt::Display for RestorationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            RestorationAction::StartBlackstartUnit => "start blackstart unit",
            RestorationAction::StartGenerator => "start generator",
            RestorationAction::RestoreLoad => "restore load",
        };
        write!(
            f,
            "{:3} t+{:5.0} min  {} {} ({:.0} MW)",
            self.index, self.time_offset, verb, self.component_id, self.power_mw
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackstartUnit {
    pub id: String,
    pub capacity: f64,
    pub generator_type: GeneratorType,
    /// Minutes.
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackstartAssessment {
    pub units: Vec<BlackstartUnit>,
    /// MW.
    pub total_capacity: f64,
    /// MW.
    pub area_demand: f64,
    /// Blackstart capacity over demand. Zero when there is no demand.
    pub ratio: f64,
    pub meets_standard: bool,
}

/// Sums blackstart-capable generation against the area demand.
pub fn assess_blackstart_capability<'a>(
    components: impl IntoIterator<Item = &'a Component>,
    standards: &BlackstartStandards,
) -> BlackstartAssessment {
    let mut units = Vec::new();
    let mut area_demand = 0.0;
    for c in components.into_iter().filter(|c| c.is_active) {
        match c.generator_type() {
            Some(generator_type) if c.blackstart_capable => units.push(BlackstartUnit {
                id: c.id.clone(),
                capacity: c.capacity,
                generator_type,
                start_time: c.blackstart_time,
            }),
            Some(_) => {}
            None => area_demand += c.demand(),
        }
    }
    let total_capacity = units.iter().map(|u| u.capacity).sum::<f64>();
    let ratio = if area_demand > 0.0 {
        total_capacity / area_demand
    } else {
        0.0
    };
    BlackstartAssessment {
        units,
        total_capacity,
        area_demand,
        ratio,
        meets_standard: ratio >= standards.min_capacity_fraction,
    }
}

fn push_step(
    sequence: &mut Vec<RestorationStep>,
    c: &Component,
    action: RestorationAction,
    phase: RestorationPhase,
    time_offset: f64,
    power_mw: f64,
) {
    sequence.push(RestorationStep {
        index: sequence.len(),
        component_id: c.id.clone(),
        action,
        time_offset,
        phase,
        power_mw,
    });
}

fn type_priority(c: &Component) -> u32 {
    c.generator_type()
        .map_or(GeneratorType::Unknown.restoration_priority(), |t| {
            t.restoration_priority()
        })
}

/// Builds the three-phase restoration plan.
///
/// Blackstart units come first by start time, then the remaining
/// generators by type priority on a running clock, then loads by
/// restoration priority in bounded pickup increments.
pub fn generate_restoration_sequence<'a>(
    components: impl IntoIterator<Item = &'a Component>,
    standards: &BlackstartStandards,
) -> Vec<RestorationStep> {
    let active: Vec<&Component> = components.into_iter().filter(|c| c.is_active).collect();
    let mut sequence: Vec<RestorationStep> = Vec::new();

    let mut units: Vec<&Component> = active
        .iter()
        .copied()
        .filter(|c| c.is_generator() && c.blackstart_capable)
        .collect();
    units.sort_by(|a, b| {
        a.blackstart_time
            .total_cmp(&b.blackstart_time)
            .then(type_priority(a).cmp(&type_priority(b)))
    });
    for c in &units {
        push_step(
            &mut sequence,
            c,
            RestorationAction::StartBlackstartUnit,
            RestorationPhase::BlackstartUnits,
            c.blackstart_time,
            c.capacity,
        );
    }

    let mut clock = units
        .iter()
        .map(|c| c.blackstart_time)
        .fold(0.0, f64::max);

    let mut others: Vec<&Component> = active
        .iter()
        .copied()
        .filter(|c| c.is_generator() && !c.blackstart_capable)
        .collect();
    others.sort_by_key(|c| type_priority(c));
    for c in &others {
        clock += c.blackstart_time;
        push_step(
            &mut sequence,
            c,
            RestorationAction::StartGenerator,
            RestorationPhase::GenerationRestoration,
            clock,
            c.capacity,
        );
    }

    // a pickup ceiling outside (0, 1] restores each load in one step
    let pickup_fraction = if standards.max_load_pickup > 0.0 {
        standards.max_load_pickup.min(1.0)
    } else {
        log::warn!(
            "load pickup ceiling {} is not positive, restoring loads in one step",
            standards.max_load_pickup
        );
        1.0
    };

    let mut loads: Vec<&Component> = active.iter().copied().filter(|c| c.is_load()).collect();
    loads.sort_by_key(|c| c.restoration_priority);
    for c in &loads {
        let demand = c.demand();
        let increment = pickup_fraction * demand;
        let mut remaining = demand;
        loop {
            let pickup = increment.min(remaining);
            clock += standards.load_pickup_step;
            push_step(
                &mut sequence,
                c,
                RestorationAction::RestoreLoad,
                RestorationPhase::LoadRestoration,
                clock,
                pickup,
            );
            remaining -= pickup;
            if remaining <= PICKUP_EPS {
                break;
            }
        }
    }

    sequence
}

/// Drives assessment, sequencing and step-by-step restoration.
#[derive(Debug, Clone)]
pub struct BlackstartSequencer {
    standards: BlackstartStandards,
    state: BlackstartState,
    assessment: Option<BlackstartAssessment>,
    sequence: Option<Vec<RestorationStep>>,
    cursor: usize,
    active: bool,
}

impl BlackstartSequencer {
    pub fn new(standards: BlackstartStandards) -> Self {
        Self {
            standards,
            state: BlackstartState::Idle,
            assessment: None,
            sequence: None,
            cursor: 0,
            active: false,
        }
    }

    pub fn state(&self) -> BlackstartState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn assessment(&self) -> Option<&BlackstartAssessment> {
        self.assessment.as_ref()
    }

    pub fn sequence(&self) -> &[RestorationStep] {
        self.sequence.as_deref().unwrap_or(&[])
    }

    pub fn assess<'a>(
        &mut self,
        components: impl IntoIterator<Item = &'a Component>,
    ) -> &BlackstartAssessment {
        self.state = BlackstartState::Assessing;
        let assessment = assess_blackstart_capability(components, &self.standards);
        if assessment.meets_standard {
            log::info!(
                "blackstart capacity {:.0} MW covers {:.1} % of demand",
                assessment.total_capacity,
                assessment.ratio * 100.0
            );
        } else {
            log::warn!(
                "blackstart capacity {:.1} % of demand is below the {:.0} % minimum",
                assessment.ratio * 100.0,
                self.standards.min_capacity_fraction * 100.0
            );
        }
        self.assessment.insert(assessment)
    }

    /// Computes a new sequence. Requires a prior assessment.
    pub fn generate_sequence<'a>(
        &mut self,
        components: impl IntoIterator<Item = &'a Component>,
    ) -> Result<&[RestorationStep], Refusal> {
        if self.assessment.is_none() {
            return Err(Refusal::NotAssessed);
        }
        self.state = BlackstartState::Sequencing;
        self.cursor = 0;
        self.active = false;
        let sequence = generate_restoration_sequence(components, &self.standards);
        log::debug!("restoration sequence has {} steps", sequence.len());
        Ok(self.sequence.insert(sequence).as_slice())
    }

    /// Enters the restoring state with the last computed sequence. An empty
    /// sequence completes at once.
    pub fn start_restoration(&mut self) -> Result<(), Refusal> {
        let len = self.sequence.as_ref().ok_or(Refusal::NoSequence)?.len();
        if len == 0 {
            self.complete();
        } else {
            self.state = BlackstartState::Restoring;
            self.active = true;
        }
        Ok(())
    }

    /// Returns the next step, or `None` when no restoration is running.
    pub fn advance(&mut self) -> Option<RestorationStep> {
        if !self.active {
            return None;
        }
        let step = self.sequence.as_ref()?.get(self.cursor)?.clone();
        self.cursor += 1;
        if self.cursor >= self.sequence().len() {
            self.complete();
        }
        Some(step)
    }

    fn complete(&mut self) {
        log::info!("restoration complete");
        self.state = BlackstartState::Complete;
        self.active = false;
        self.cursor = 0;
    }
}

impl Default for BlackstartSequencer {
    fn default() -> Self {
        Self::new(BlackstartStandards::default())
    }
}
