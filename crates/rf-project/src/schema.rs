//! Task file schema definitions.

use std::collections::BTreeMap;

use rf_controls::{ActuatorClass, ActuatorPlacement, BoundsPolicy, ControllerSpec};
use rf_mfd::{MfdSamples, OutputKind};
use serde::{Deserialize, Serialize};

/// One control experiment: network, regions, fitted MFDs, actuators,
/// controller and schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    pub schema_version: u32,
    pub name: String,
    pub network: NetworkDef,
    pub regions: RegionsDef,
    pub mfd: MfdDef,
    #[serde(default)]
    pub routing: RoutingDef,
    #[serde(default)]
    pub completion: CompletionDef,
    #[serde(default)]
    pub demand: DemandDef,
    pub actuators: ActuatorsDef,
    #[serde(default)]
    pub controller: ControllerSpec,
    pub control: ControlDef,
    #[serde(default)]
    pub engine: EngineDef,
}

/// Inline data or a path (relative to the task file) to a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Source<T> {
    File { path: String },
    Inline(T),
}

impl<T> Source<T> {
    /// The inline value, `None` while the source still points at a file.
    pub fn inline(&self) -> Option<&T> {
        match self {
            Source::Inline(value) => Some(value),
            Source::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    pub edges: Vec<EdgeDef>,
    /// Treat every listed neighbor relation as two-way.
    #[serde(default = "default_true")]
    pub symmetric: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeDef {
    pub id: String,
    pub length_m: f64,
    pub lanes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed_mps: Option<f64>,
    #[serde(default)]
    pub neighbors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionsDef {
    pub labels: Source<LabelsDef>,
}

/// Edge → region labels, either in edge order or keyed by edge id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LabelsDef {
    Ordered(Vec<usize>),
    Named(BTreeMap<String, usize>),
}

impl LabelsDef {
    pub fn n_regions(&self) -> usize {
        let max = match self {
            LabelsDef::Ordered(labels) => labels.iter().max().copied(),
            LabelsDef::Named(labels) => labels.values().max().copied(),
        };
        max.map_or(0, |m| m.saturating_add(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MfdDef {
    #[serde(default = "default_degree")]
    pub degree: usize,
    #[serde(default = "default_n_pwa")]
    pub n_pwa: usize,
    /// Recorded samples, one set per region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Source<Vec<MfdSamples>>>,
    /// Collect samples with the built-in engine instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationDef {
    pub end_s: f64,
    pub interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingDef {
    /// `fraction` of each region's outflow split evenly over its neighbors.
    Uniform { fraction: f64 },
    /// Explicit `rows[from][to]` fractions.
    Matrix { rows: Vec<Vec<f64>> },
    /// All outflow leaves the network.
    Isolated,
}

impl Default for RoutingDef {
    fn default() -> Self {
        RoutingDef::Uniform { fraction: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionDef {
    pub base: f64,
    pub period_s: f64,
}

impl Default for CompletionDef {
    fn default() -> Self {
        Self {
            base: 0.9,
            period_s: 20.0,
        }
    }
}

/// Origin-destination demand. At most one form may be given; no demand
/// leaves the network to drain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemandDef {
    /// `od[origin][destination][slot]`, vehicles per one-second slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od: Option<Source<Vec<Vec<Vec<f64>>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<ConstantDemand>,
}

/// The same `rates[origin][destination]` (vehicles per second) in every slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConstantDemand {
    pub rates: Vec<Vec<f64>>,
    pub slots: usize,
}

impl ConstantDemand {
    pub fn expand(&self) -> Vec<Vec<Vec<f64>>> {
        self.rates
            .iter()
            .map(|row| row.iter().map(|&rate| vec![rate; self.slots]).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorsDef {
    pub class: ActuatorClass,
    #[serde(default)]
    pub policy: BoundsPolicy,
    /// Overrides the class envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsDef>,
    #[serde(default)]
    pub placements: Vec<ActuatorPlacement>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundsDef {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlDef {
    #[serde(default)]
    pub begin_s: f64,
    pub end_s: f64,
    pub cycle_s: f64,
    #[serde(default)]
    pub output: OutputKind,
    #[serde(default = "default_horizon")]
    pub reference_horizon: usize,
    /// Diagonal of the tracking-error weight; identity when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_weights: Option<Vec<f64>>,
    #[serde(default)]
    pub seed: u64,
}

/// Parameters of the built-in regional engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineDef {
    pub step_s: f64,
    pub jam_density: f64,
    pub initial_density: f64,
    pub exit_share: f64,
    pub demand_noise: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_at_s: Option<f64>,
}

impl Default for EngineDef {
    fn default() -> Self {
        Self {
            step_s: 1.0,
            jam_density: 140.0,
            initial_density: 10.0,
            exit_share: 0.1,
            demand_noise: 0.0,
            fail_at_s: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_degree() -> usize {
    4
}

fn default_n_pwa() -> usize {
    10
}

fn default_horizon() -> usize {
    5
}
