//! Task configuration → runtime objects (network, partition, MFDs, model,
//! actuators, loop configuration).

use std::collections::HashMap;

use rf_controls::{ActuatorGroup, ControlClock, SafetyBounds};
use rf_core::{m, mps, s};
use rf_mfd::{MfdApproximator, MfdConfig, MfdSamples, RegionMfd};
use rf_model::{CompletionRate, DemandTensor, LinearDynamicsModel, RoutingTable};
use rf_network::{Network, NetworkBuilder, RegionPartition};
use rf_project::{LabelsDef, RoutingDef, Source, TaskConfig};
use rf_sim::{
    EngineSession, ErrorWeights, LoopConfig, RegionalEngine, RegionalEngineConfig,
    collect_mfd_samples,
};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Everything a control run needs, built from one task.
#[derive(Debug, Clone)]
pub struct TaskRuntime {
    pub network: Network,
    pub partition: RegionPartition,
    pub demand: DemandTensor,
    pub mfds: Vec<RegionMfd>,
    pub model: LinearDynamicsModel,
    pub group: ActuatorGroup,
    pub loop_config: LoopConfig,
}

fn inline<'a, T>(source: &'a Source<T>, what: &str) -> AppResult<&'a T> {
    source
        .inline()
        .ok_or_else(|| AppError::Configuration(format!("{what} was not loaded")))
}

pub fn build_network(task: &TaskConfig) -> AppResult<Network> {
    let mut builder = NetworkBuilder::new();
    let ids: HashMap<&str, _> = task
        .network
        .edges
        .iter()
        .map(|edge| {
            let id = builder.add_edge(edge.id.as_str(), m(edge.length_m), edge.lanes);
            if let Some(v) = edge.max_speed_mps {
                builder.set_max_speed(id, mps(v));
            }
            (edge.id.as_str(), id)
        })
        .collect();

    for edge in &task.network.edges {
        let from = ids[edge.id.as_str()];
        for neighbor in &edge.neighbors {
            let to = *ids.get(neighbor.as_str()).ok_or_else(|| {
                AppError::Configuration(format!("unknown neighbor '{neighbor}' of '{}'", edge.id))
            })?;
            if task.network.symmetric {
                builder.connect(from, to);
            } else {
                builder.add_neighbor(from, to);
            }
        }
    }
    Ok(builder.build()?)
}

pub fn build_partition(task: &TaskConfig, network: &Network) -> AppResult<RegionPartition> {
    let partition = match inline(&task.regions.labels, "region labels")? {
        LabelsDef::Ordered(labels) => RegionPartition::from_labels(network, labels)?,
        LabelsDef::Named(labels) => {
            let labels: HashMap<String, usize> =
                labels.iter().map(|(k, v)| (k.clone(), *v)).collect();
            RegionPartition::from_named_labels(network, &labels)?
        }
    };
    Ok(partition)
}

pub fn build_demand(task: &TaskConfig, n_regions: usize) -> AppResult<DemandTensor> {
    let demand = match (&task.demand.od, &task.demand.constant) {
        (Some(od), _) => DemandTensor::from_nested(inline(od, "demand")?)?,
        (None, Some(constant)) => DemandTensor::from_nested(&constant.expand())?,
        (None, None) => DemandTensor::zeros(n_regions, 0),
    };
    if demand.n_regions() != n_regions {
        return Err(AppError::Configuration(format!(
            "demand covers {} regions, partition has {n_regions}",
            demand.n_regions()
        )));
    }
    Ok(demand)
}

pub fn build_routing(task: &TaskConfig, partition: &RegionPartition) -> AppResult<RoutingTable> {
    let routing = match &task.routing {
        RoutingDef::Uniform { fraction } => RoutingTable::uniform(partition.adjacency(), *fraction)?,
        RoutingDef::Matrix { rows } => RoutingTable::new(rows, partition.adjacency())?,
        RoutingDef::Isolated => RoutingTable::isolated(partition.n_regions()),
    };
    Ok(routing)
}

pub fn engine_config(task: &TaskConfig) -> RegionalEngineConfig {
    let engine = &task.engine;
    RegionalEngineConfig {
        step_s: engine.step_s,
        jam_density: engine.jam_density,
        initial_density: engine.initial_density,
        exit_share: engine.exit_share,
        demand_noise: engine.demand_noise,
        seed: task.control.seed,
        fail_at_s: engine.fail_at_s,
    }
}

/// Recorded samples, or a calibration run on the built-in engine.
pub fn obtain_samples(
    task: &TaskConfig,
    network: &Network,
    partition: &RegionPartition,
    demand: &DemandTensor,
) -> AppResult<Vec<MfdSamples>> {
    if let Some(samples) = &task.mfd.samples {
        return Ok(inline(samples, "MFD samples")?.clone());
    }
    let calibration = task.mfd.calibration.as_ref().ok_or_else(|| {
        AppError::Configuration("task gives neither MFD samples nor calibration".to_string())
    })?;

    let engine = RegionalEngine::new(
        network.clone(),
        partition,
        demand.clone(),
        engine_config(task),
    )?;
    let mut session = EngineSession::open(engine, partition.n_regions())?;
    let samples = collect_mfd_samples(
        &mut session,
        partition,
        s(0.0),
        s(calibration.end_s),
        s(calibration.interval_s),
    )?;
    session.close()?;
    Ok(samples)
}

pub fn fit_mfds(task: &TaskConfig, samples: &[MfdSamples]) -> AppResult<Vec<RegionMfd>> {
    let approximator = MfdApproximator::new(MfdConfig {
        degree: task.mfd.degree,
        n_pwa: task.mfd.n_pwa,
    })?;
    let mfds = approximator.fit_all(samples)?;
    for (region, mfd) in mfds.iter().enumerate() {
        info!(
            region,
            critical_density = mfd.critical_density,
            jam_density = mfd.jam_density,
            max_flow = mfd.max_flow(),
            "fitted regional MFD"
        );
    }
    Ok(mfds)
}

pub fn build_actuators(
    task: &TaskConfig,
    network: &Network,
    partition: &RegionPartition,
) -> AppResult<ActuatorGroup> {
    let spec = &task.actuators;
    let mut group = ActuatorGroup::new(spec.class.clone(), &spec.placements, network, partition)?
        .with_policy(spec.policy);
    if let Some(bounds) = spec.bounds {
        group = group.with_bounds(SafetyBounds::new(bounds.lower, bounds.upper)?);
    }
    Ok(group)
}

pub fn build_loop_config(task: &TaskConfig, n_regions: usize) -> AppResult<LoopConfig> {
    let control = &task.control;
    let clock = ControlClock::new(s(control.begin_s), s(control.end_s), s(control.cycle_s))?;
    let weights = match &control.error_weights {
        Some(w) => ErrorWeights::diagonal(w)?,
        None => ErrorWeights::identity(control.output.n_outputs(n_regions)),
    };
    Ok(LoopConfig {
        clock,
        output: control.output,
        reference_horizon: control.reference_horizon,
        weights,
    })
}

/// Build every runtime object of a validated task.
///
/// `on_calibrate` runs before a calibration run is started, so callers can
/// report the (possibly long) sampling phase.
pub fn assemble_task(
    task: &TaskConfig,
    mut on_calibrate: impl FnMut(),
) -> AppResult<TaskRuntime> {
    let network = build_network(task)?;
    let partition = build_partition(task, &network)?;
    let demand = build_demand(task, partition.n_regions())?;

    if task.mfd.samples.is_none() {
        on_calibrate();
    }
    let samples = obtain_samples(task, &network, &partition, &demand)?;
    let mfds = fit_mfds(task, &samples)?;

    let routing = build_routing(task, &partition)?;
    let completion = CompletionRate {
        base: task.completion.base,
        period: s(task.completion.period_s),
    };
    let model =
        LinearDynamicsModel::from_partition(&network, &partition, mfds.clone(), routing, completion)?;
    let group = build_actuators(task, &network, &partition)?;
    let loop_config = build_loop_config(task, partition.n_regions())?;

    Ok(TaskRuntime {
        network,
        partition,
        demand,
        mfds,
        model,
        group,
        loop_config,
    })
}
