use crate::command::{Command, CommandLog};
use crate::contingency::ContingencyResult;
use crate::engine::GridEngine;
use crate::error::{GridError, Refusal};
use crate::math::distance;
use crate::network::{Branch, Bus, BusType, Network};
use crate::options::GridOpt;
use crate::standards::Standards;
use std::collections::BTreeMap;
use std::fmt;

/// Placement radius within which a component snaps to a grid node.
pub const SNAP_DISTANCE: f64 = 30.0;
/// Canvas units per kilometre.
const CANVAS_SCALE: f64 = 10.0;
const MIN_LINE_LENGTH: f64 = 1.0;
const DEFAULT_BUDGET: f64 = 500_000.0;
const HVDC_CAPACITY: f64 = 1000.0;
const HVDC_RESISTANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        distance(self.x, self.y, other.x, other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorType {
    Hydro,
    Gas,
    Coal,
    Nuclear,
    Wind,
    Solar,
    Unknown,
}

impl GeneratorType {
    /// Restoration order; lower starts first.
    pub fn restoration_priority(&self) -> u32 {
        match self {
            GeneratorType::Hydro => 1,
            GeneratorType::Gas => 2,
            GeneratorType::Coal => 3,
            GeneratorType::Nuclear => 4,
            GeneratorType::Wind | GeneratorType::Solar => 5,
            GeneratorType::Unknown => 6,
        }
    }

    /// Typical cold start time (minutes).
    pub fn start_time(&self) -> f64 {
        match self {
            GeneratorType::Hydro => 5.0,
            GeneratorType::Gas => 10.0,
            GeneratorType::Coal => 30.0,
            GeneratorType::Nuclear => 60.0,
            GeneratorType::Wind | GeneratorType::Solar => 90.0,
            GeneratorType::Unknown => 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadClass {
    Critical,
    Important,
    Normal,
}

impl LoadClass {
    pub fn restoration_priority(&self) -> u32 {
        match self {
            LoadClass::Critical => 1,
            LoadClass::Important => 2,
            LoadClass::Normal => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Generator(GeneratorType),
    Substation,
    Load(LoadClass),
}

impl ComponentKind {
    pub fn cost(&self) -> f64 {
        match self {
            ComponentKind::Generator(_) => 15_000.0,
            ComponentKind::Substation => 8_000.0,
            ComponentKind::Load(_) => 0.0,
        }
    }

    /// Connection level (kV).
    pub fn voltage_kv(&self) -> f64 {
        match self {
            ComponentKind::Generator(_) => 400.0,
            ComponentKind::Substation => 220.0,
            ComponentKind::Load(_) => 110.0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ComponentKind::Generator(_) => "generator",
            ComponentKind::Substation => "substation",
            ComponentKind::Load(_) => "load",
        }
    }
}

/// A placed generator, substation or load.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub kind: ComponentKind,
    pub position: Point,
    /// MW, positive for generation and negative for load.
    pub capacity: f64,
    pub cost: f64,
    pub voltage_kv: f64,

    /// MW, signed like `capacity`.
    pub active_power: f64,
    /// MVAr, signed like `capacity`.
    pub reactive_power: f64,
    /// Measured voltage (p.u.).
    pub voltage_magnitude: f64,
    /// Voltage angle (radians).
    pub voltage_angle: f64,
    pub voltage_setpoint: f64,
    pub q_min: f64,
    pub q_max: f64,

    pub blackstart_capable: bool,
    /// Minutes from cold to synchronised.
    pub blackstart_time: f64,
    pub restoration_priority: u32,
    pub avr_enabled: bool,

    pub connected_node: Option<String>,
    pub is_active: bool,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentKind, capacity: f64) -> Self {
        let (capacity, reactive, q_limit) = match kind {
            ComponentKind::Generator(_) => {
                let p = capacity.abs();
                (p, 0.0, 0.5 * p)
            }
            ComponentKind::Substation => (0.0, 0.0, 0.0),
            ComponentKind::Load(_) => {
                let p = capacity.abs();
                (-p, -0.3 * p, 0.0)
            }
        };
        let (restoration_priority, blackstart_time) = match kind {
            ComponentKind::Generator(t) => (t.restoration_priority(), t.start_time()),
            ComponentKind::Load(c) => (c.restoration_priority(), 0.0),
            ComponentKind::Substation => (5, 0.0),
        };
        Self {
            id: id.into(),
            kind,
            position: Point::default(),
            capacity,
            cost: kind.cost(),
            voltage_kv: kind.voltage_kv(),
            active_power: capacity,
            reactive_power: reactive,
            voltage_magnitude: 1.0,
            voltage_angle: 0.0,
            voltage_setpoint: 1.0,
            q_min: -q_limit,
            q_max: q_limit,
            blackstart_capable: false,
            blackstart_time,
            restoration_priority,
            avr_enabled: matches!(kind, ComponentKind::Generator(_)),
            connected_node: None,
            is_active: true,
        }
    }

    pub fn generator(id: impl Into<String>, gen_type: GeneratorType, capacity: f64) -> Self {
        Self::new(id, ComponentKind::Generator(gen_type), capacity)
    }

    pub fn load(id: impl Into<String>, class: LoadClass, demand: f64) -> Self {
        Self::new(id, ComponentKind::Load(class), demand)
    }

    pub fn substation(id: impl Into<String>) -> Self {
        Self::new(id, ComponentKind::Substation, 0.0)
    }

    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn voltage_level(mut self, kv: f64) -> Self {
        self.voltage_kv = kv;
        self
    }

    pub fn blackstart(mut self, start_time: f64) -> Self {
        self.blackstart_capable = true;
        self.blackstart_time = start_time;
        self
    }

    pub fn is_generator(&self) -> bool {
        matches!(self.kind, ComponentKind::Generator(_))
    }

    pub fn is_load(&self) -> bool {
        matches!(self.kind, ComponentKind::Load(_))
    }

    pub fn generator_type(&self) -> Option<GeneratorType> {
        match self.kind {
            ComponentKind::Generator(t) => Some(t),
            _ => None,
        }
    }

    /// Consumption of a load (MW), zero for other components.
    pub fn demand(&self) -> f64 {
        if self.is_load() {
            -self.capacity
        } else {
            0.0
        }
    }

    /// Bus this component is solved at.
    pub fn electrical_point(&self) -> &str {
        self.connected_node.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Transmission,
    Distribution,
    Hvdc,
}

impl LineKind {
    pub fn cost_per_km(&self) -> f64 {
        match self {
            LineKind::Transmission => 2000.0,
            LineKind::Distribution => 1000.0,
            LineKind::Hvdc => 3000.0,
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Transmission => write!(f, "transmission-line"),
            LineKind::Distribution => write!(f, "distribution-line"),
            LineKind::Hvdc => write!(f, "hvdc-line"),
        }
    }
}

/// A line between two components or nodes, in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerLine {
    pub id: String,
    pub kind: LineKind,
    pub from_id: String,
    pub to_id: String,
    pub length_km: f64,
    pub cost: f64,
    /// Thermal capacity (MVA).
    pub capacity: f64,
    pub voltage_kv: f64,
    /// Series resistance (Ω).
    pub resistance: f64,
    /// Series reactance (Ω).
    pub reactance: f64,
    /// Shunt susceptance (S).
    pub susceptance: f64,
    pub is_active: bool,
}

impl PowerLine {
    /// Sizes a line of `length_km` at `voltage_kv` from the standards table.
    pub fn new(
        id: impl Into<String>,
        kind: LineKind,
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        length_km: f64,
        voltage_kv: f64,
        standards: &Standards,
    ) -> Self {
        let net = &standards.network;
        let (resistance, reactance, susceptance, capacity) = match kind {
            LineKind::Hvdc => (HVDC_RESISTANCE * length_km, 0.0, 0.0, HVDC_CAPACITY),
            LineKind::Transmission | LineKind::Distribution => {
                let p = net.line_parameters(voltage_kv, length_km);
                let b = if kind == LineKind::Transmission {
                    net.transmission_susceptance
                } else {
                    net.distribution_susceptance
                };
                (p.r, p.x, b * length_km, p.thermal_limit)
            }
        };
        Self {
            id: id.into(),
            kind,
            from_id: from_id.into(),
            to_id: to_id.into(),
            length_km,
            cost: (length_km * kind.cost_per_km()).round(),
            capacity,
            voltage_kv,
            resistance,
            reactance,
            susceptance,
            is_active: true,
        }
    }
}

/// An explicit junction that several components can share.
#[derive(Debug, Clone, PartialEq)]
pub struct GridNode {
    pub id: String,
    pub position: Point,
    pub voltage_kv: f64,
    pub components: Vec<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineLoading {
    /// Apparent power at the sending end (MVA).
    pub flow: f64,
    pub limit: f64,
    pub percentage: f64,
}

/// Game-facing summary of a simulation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationResult {
    pub success: bool,
    /// MW.
    pub load_served: f64,
    /// Demand with no path to a generator (MW).
    pub unserved_load: f64,
    /// Delivered over generated power, percent.
    pub efficiency: f64,
    /// Share of N-1 cases that are not critical, 0 to 1.
    pub reliability: f64,
    pub total_losses: f64,
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
    /// Component id to (magnitude p.u., angle radians).
    pub voltage_profile: BTreeMap<String, (f64, f64)>,
    pub line_loading: BTreeMap<String, LineLoading>,
    pub n1: Vec<ContingencyResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A player's grid: placed components, lines and nodes plus the budget
/// they were paid from. All edits go through the command log.
#[derive(Debug, Clone)]
pub struct Grid {
    pub(crate) components: BTreeMap<String, Component>,
    pub(crate) lines: BTreeMap<String, PowerLine>,
    pub(crate) nodes: BTreeMap<String, GridNode>,
    pub(crate) budget: f64,
    initial_budget: f64,
    counter: usize,
    history: CommandLog,
    standards: Standards,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

impl Grid {
    pub fn new(budget: f64) -> Self {
        Self {
            components: BTreeMap::new(),
            lines: BTreeMap::new(),
            nodes: BTreeMap::new(),
            budget,
            initial_budget: budget,
            counter: 0,
            history: CommandLog::default(),
            standards: Standards::default(),
        }
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn component_mut(&mut self, id: &str) -> Option<&mut Component> {
        self.components.get_mut(id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &PowerLine> {
        self.lines.values()
    }

    pub fn line(&self, id: &str) -> Option<&PowerLine> {
        self.lines.get(id)
    }

    pub fn node(&self, id: &str) -> Option<&GridNode> {
        self.nodes.get(id)
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }

    fn position_of(&self, id: &str) -> Option<(Point, f64)> {
        if let Some(c) = self.components.get(id) {
            Some((c.position, c.voltage_kv))
        } else {
            self.nodes.get(id).map(|n| (n.position, n.voltage_kv))
        }
    }

    /// Nearest node strictly within `max_distance` of `position`.
    pub fn find_nearest_node(&self, position: &Point, max_distance: f64) -> Option<&GridNode> {
        self.nodes
            .values()
            .map(|n| (n, n.position.distance(position)))
            .filter(|(_, d)| *d < max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }

    fn charge(&self, cost: f64) -> Result<(), Refusal> {
        if self.budget < cost {
            return Err(Refusal::InsufficientBudget {
                need: cost,
                have: self.budget,
            });
        }
        Ok(())
    }

    /// Places a catalogue component at `position`, connecting it to a
    /// nearby node if there is one.
    pub fn place_component(
        &mut self,
        kind: ComponentKind,
        capacity: f64,
        position: Point,
    ) -> Result<String, Refusal> {
        self.charge(kind.cost())?;
        let id = self.next_id(kind.label());
        self.place(Component::new(id, kind, capacity).at(position))
    }

    /// Places a fully specified component.
    pub fn place(&mut self, mut component: Component) -> Result<String, Refusal> {
        if self.components.contains_key(&component.id) || self.nodes.contains_key(&component.id) {
            return Err(Refusal::DuplicateId(component.id));
        }
        self.charge(component.cost)?;
        component.connected_node = self
            .find_nearest_node(&component.position, SNAP_DISTANCE)
            .map(|n| n.id.clone());
        let id = component.id.clone();
        self.execute(Command::PlaceComponent { component });
        Ok(id)
    }

    /// Places a line between two components or nodes. Its length comes
    /// from the canvas distance and its voltage from the sending end.
    pub fn place_line(&mut self, kind: LineKind, from_id: &str, to_id: &str) -> Result<String, Refusal> {
        if from_id == to_id {
            return Err(Refusal::SelfLoop);
        }
        let (from_pos, kv) = self
            .position_of(from_id)
            .ok_or_else(|| Refusal::UnknownEndpoint(from_id.to_string()))?;
        let (to_pos, _) = self
            .position_of(to_id)
            .ok_or_else(|| Refusal::UnknownEndpoint(to_id.to_string()))?;

        let length = (from_pos.distance(&to_pos) / CANVAS_SCALE).max(MIN_LINE_LENGTH);
        let cost = (length * kind.cost_per_km()).round();
        self.charge(cost)?;

        let id = self.next_id("line");
        let line = PowerLine::new(id.clone(), kind, from_id, to_id, length, kv, &self.standards);
        self.execute(Command::PlaceLine { line });
        Ok(id)
    }

    pub fn place_node(&mut self, position: Point, voltage_kv: f64) -> Result<String, Refusal> {
        let id = self.next_id("node");
        let node = GridNode {
            id: id.clone(),
            position,
            voltage_kv,
            components: Vec::new(),
            lines: Vec::new(),
        };
        self.execute(Command::PlaceNode { node });
        Ok(id)
    }

    /// Deletes a line and refunds its cost.
    pub fn remove_line(&mut self, id: &str) -> Result<(), Refusal> {
        let line = self
            .lines
            .get(id)
            .cloned()
            .ok_or_else(|| Refusal::NotFound(id.to_string()))?;
        self.execute(Command::RemoveLine { line });
        Ok(())
    }

    fn execute(&mut self, command: Command) {
        command.apply(self);
        self.history.push(command);
    }

    pub fn undo(&mut self) -> Result<(), Refusal> {
        let inverse = self.history.undo().ok_or(Refusal::NothingToUndo)?;
        inverse.apply(self);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), Refusal> {
        let command = self.history.redo().ok_or(Refusal::NothingToRedo)?;
        command.apply(self);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Removes everything and restores the starting budget.
    pub fn clear(&mut self) {
        self.components.clear();
        self.lines.clear();
        self.nodes.clear();
        self.budget = self.initial_budget;
        self.counter = 0;
        self.history.clear();
    }

    /// Reasons the grid cannot be simulated.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.components.is_empty() {
            errors.push("No components in the grid".to_string());
            return errors;
        }
        if !self.components.values().any(|c| c.is_generator()) {
            errors.push("No generators found - grid cannot supply power".to_string());
        }
        if !self.components.values().any(|c| c.is_load()) {
            errors.push("No load centers found - no power demand".to_string());
        }
        errors
    }

    /// Projects the grid onto a bus/branch network in per-unit of
    /// `base_mva`.
    ///
    /// Nodes and unattached components become buses. Generator buses are
    /// PV at their voltage setpoint, except that the largest generator of
    /// each island becomes its slack bus.
    pub fn to_network(&self, base_mva: f64) -> Result<Network, GridError> {
        let mut buses: BTreeMap<String, Bus> = BTreeMap::new();
        for node in self.nodes.values() {
            buses.insert(node.id.clone(), Bus::new(&node.id, node.voltage_kv, BusType::PQ));
        }

        for c in self.components.values().filter(|c| c.is_active) {
            let point = c.electrical_point().to_string();
            let bus = buses
                .entry(point.clone())
                .or_insert_with(|| Bus::new(&point, c.voltage_kv, BusType::PQ));
            match c.kind {
                ComponentKind::Generator(_) => {
                    bus.gen_p += c.active_power;
                    bus.gen_p_max += c.capacity;
                    bus.vm = c.voltage_setpoint;
                    bus.bus_type = BusType::PV;
                }
                ComponentKind::Load(_) => {
                    bus.load_p += -c.active_power;
                    bus.load_q += -c.reactive_power;
                }
                ComponentKind::Substation => {}
            }
        }

        let mut network = Network::new(base_mva).with_standards(self.standards.clone());
        for bus in buses.into_values() {
            network.add_bus(bus)?;
        }

        for line in self.lines.values().filter(|l| l.is_active) {
            let from = self.point_of(&line.from_id)?;
            let to = self.point_of(&line.to_id)?;
            if from == to {
                continue;
            }
            let z_base = line.voltage_kv * line.voltage_kv / base_mva;
            let branch = Branch::new(
                &line.id,
                from,
                to,
                line.resistance / z_base,
                line.reactance / z_base,
                line.susceptance * z_base,
            )
            .rating(line.capacity);
            network.add_branch(branch)?;
        }

        for island in network.islands() {
            let slack = island
                .iter()
                .map(|&i| &network.buses()[i])
                .filter(|b| b.gen_p_max > 0.0)
                .fold(None, |best: Option<&Bus>, b| match best {
                    Some(x) if x.gen_p_max >= b.gen_p_max => Some(x),
                    _ => Some(b),
                })
                .map(|b| b.id.clone());
            if let Some(id) = slack {
                network.set_bus_type(&id, BusType::Slack)?;
            }
        }

        Ok(network)
    }

    fn point_of<'a>(&'a self, id: &'a str) -> Result<&'a str, GridError> {
        if let Some(c) = self.components.get(id) {
            Ok(c.electrical_point())
        } else if self.nodes.contains_key(id) {
            Ok(id)
        } else {
            Err(GridError::UnknownBus(id.to_string()))
        }
    }

    /// Solves the grid, runs N-1 analysis and writes the solved voltages
    /// back to the components.
    ///
    /// Buses without a path to a generator are left out of the solve.
    /// Their demand is reported as unserved and their components are
    /// marked de-energized.
    pub fn simulate(&mut self, opt: &GridOpt) -> SimulationResult {
        let errors = self.validate();
        if !errors.is_empty() {
            return SimulationResult {
                errors,
                ..Default::default()
            };
        }

        let projected = match self.to_network(opt.base_mva) {
            Ok(network) => network,
            Err(err) => {
                return SimulationResult {
                    errors: vec![err.to_string()],
                    ..Default::default()
                }
            }
        };
        let unserved_load = projected.unserved_load();
        let dark: Vec<String> = projected
            .buses()
            .iter()
            .zip(projected.energized())
            .filter(|(_, e)| !e)
            .map(|(b, _)| b.id.clone())
            .collect();
        let network = if dark.is_empty() {
            projected
        } else {
            match projected.energized_part() {
                Ok(network) => network,
                Err(err) => {
                    return SimulationResult {
                        errors: vec![err.to_string()],
                        ..Default::default()
                    }
                }
            }
        };

        let mut engine = GridEngine::new(network, opt.clone());
        let pf = match engine.solve() {
            Ok(pf) => pf,
            Err(err) => {
                return SimulationResult {
                    errors: vec![err.to_string()],
                    ..Default::default()
                }
            }
        };
        if !pf.converged {
            return SimulationResult {
                iterations: pf.iterations,
                max_mismatch: pf.max_mismatch,
                warnings: vec![format!(
                    "power flow did not converge in {} iterations",
                    pf.iterations
                )],
                ..Default::default()
            };
        }

        let n1 = match engine.run_contingency_analysis(false) {
            Ok(results) => results,
            Err(err) => {
                log::warn!("N-1 analysis failed: {}", err);
                Vec::new()
            }
        };

        let network = engine.network();
        let mut warnings = Vec::new();
        let mut voltage_profile = BTreeMap::new();
        for c in self.components.values_mut().filter(|c| c.is_active) {
            if let Some(bus) = network.bus(c.electrical_point()) {
                c.voltage_magnitude = bus.vm;
                c.voltage_angle = bus.va;
                voltage_profile.insert(c.id.clone(), (bus.vm, bus.va));
            } else if dark.iter().any(|id| id == c.electrical_point()) {
                c.voltage_magnitude = 0.0;
                c.voltage_angle = 0.0;
                warnings.push(format!("{} is not connected to any generator", c.id));
            }
        }
        for (id, excess) in network.voltage_violations() {
            warnings.push(format!("bus {} outside its voltage band by {:.3} pu", id, excess));
        }

        let line_loading = network
            .branches()
            .iter()
            .map(|br| {
                let flow = f64::hypot(br.p_from, br.q_from);
                let loading = LineLoading {
                    flow,
                    limit: br.rating,
                    percentage: br.loading,
                };
                (br.id.clone(), loading)
            })
            .collect::<BTreeMap<_, _>>();
        for (id, l) in &line_loading {
            if l.percentage > 100.0 {
                warnings.push(format!("line {} loaded at {:.0} %", id, l.percentage));
            }
        }

        let load_served = network.total_load() - network.unserved_load();
        let total_losses = network.total_losses();
        let efficiency = if load_served + total_losses > 0.0 {
            load_served / (load_served + total_losses) * 100.0
        } else {
            0.0
        };
        let reliability = if n1.is_empty() {
            1.0
        } else {
            n1.iter().filter(|r| !r.critical).count() as f64 / n1.len() as f64
        };

        SimulationResult {
            success: true,
            load_served,
            unserved_load,
            efficiency,
            reliability,
            total_losses,
            converged: true,
            iterations: pf.iterations,
            max_mismatch: pf.max_mismatch,
            voltage_profile,
            line_loading,
            n1,
            errors: Vec::new(),
            warnings,
        }
    }
}
