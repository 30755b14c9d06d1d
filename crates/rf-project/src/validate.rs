//! Task validation logic.
//!
//! Structural checks only: everything that can be decided from the file
//! alone. Checks that need derived structure (routing only between adjacent
//! regions, MFD fits) happen when the run is assembled.

use std::collections::HashSet;

use crate::schema::{
    ActuatorsDef, ControlDef, EdgeDef, LabelsDef, MfdDef, RoutingDef, Source, TaskConfig,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unresolved external data: {field} still points at {path}")]
    Unresolved { field: String, path: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn resolved<'a, T>(source: &'a Source<T>, field: &str) -> Result<&'a T, ValidationError> {
    match source {
        Source::Inline(value) => Ok(value),
        Source::File { path } => Err(ValidationError::Unresolved {
            field: field.to_string(),
            path: path.clone(),
        }),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(field, value, "must be positive"));
    }
    Ok(())
}

pub fn validate_task(task: &TaskConfig) -> Result<(), ValidationError> {
    if task.schema_version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: task.schema_version,
        });
    }

    let edge_ids = validate_edges(&task.network.edges)?;
    let n_regions = validate_labels(resolved(&task.regions.labels, "regions.labels")?, &task.network.edges)?;
    validate_mfd(&task.mfd, n_regions)?;
    validate_routing(&task.routing, n_regions)?;

    if !(task.completion.base > 0.0 && task.completion.base <= 1.0) {
        return Err(invalid("completion.base", task.completion.base, "must lie in (0, 1]"));
    }
    positive("completion.period_s", task.completion.period_s)?;

    match (&task.demand.od, &task.demand.constant) {
        (Some(_), Some(_)) => {
            return Err(invalid("demand", "od/constant", "give at most one demand form"));
        }
        (Some(od), None) => validate_demand(resolved(od, "demand.od")?, n_regions)?,
        (None, Some(constant)) => {
            if constant.slots == 0 {
                return Err(invalid("demand.constant.slots", 0, "must be positive"));
            }
            validate_demand(&constant.expand(), n_regions)?;
        }
        (None, None) => {}
    }

    validate_actuators(&task.actuators, &edge_ids)?;
    validate_control(&task.control, n_regions)?;

    positive("engine.step_s", task.engine.step_s)?;
    positive("engine.jam_density", task.engine.jam_density)?;
    if !(0.0..task.engine.jam_density).contains(&task.engine.initial_density) {
        return Err(invalid(
            "engine.initial_density",
            task.engine.initial_density,
            "must lie in [0, jam_density)",
        ));
    }
    if !(task.engine.exit_share > 0.0 && task.engine.exit_share <= 1.0) {
        return Err(invalid("engine.exit_share", task.engine.exit_share, "must lie in (0, 1]"));
    }
    if !(0.0..1.0).contains(&task.engine.demand_noise) {
        return Err(invalid("engine.demand_noise", task.engine.demand_noise, "must lie in [0, 1)"));
    }

    Ok(())
}

fn validate_edges(edges: &[EdgeDef]) -> Result<HashSet<&str>, ValidationError> {
    if edges.is_empty() {
        return Err(invalid("network.edges", "[]", "network has no edges"));
    }
    let mut ids = HashSet::new();
    for edge in edges {
        if !ids.insert(edge.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: edge.id.clone(),
                context: "network edges".to_string(),
            });
        }
        positive(&format!("edge '{}' length_m", edge.id), edge.length_m)?;
        if edge.lanes == 0 {
            return Err(invalid(format!("edge '{}' lanes", edge.id), 0, "must be at least 1"));
        }
        if let Some(v) = edge.max_speed_mps {
            positive(&format!("edge '{}' max_speed_mps", edge.id), v)?;
        }
    }
    for edge in edges {
        for neighbor in &edge.neighbors {
            if !ids.contains(neighbor.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: neighbor.clone(),
                    context: format!("neighbors of edge '{}'", edge.id),
                });
            }
            if neighbor == &edge.id {
                return Err(invalid(
                    format!("edge '{}' neighbors", edge.id),
                    neighbor,
                    "an edge cannot neighbor itself",
                ));
            }
        }
    }
    Ok(ids)
}

/// Returns the region count.
fn validate_labels(labels: &LabelsDef, edges: &[EdgeDef]) -> Result<usize, ValidationError> {
    let values: Vec<usize> = match labels {
        LabelsDef::Ordered(values) => {
            if values.len() != edges.len() {
                return Err(invalid(
                    "regions.labels",
                    values.len(),
                    "need exactly one label per edge",
                ));
            }
            values.clone()
        }
        LabelsDef::Named(map) => {
            for name in map.keys() {
                if !edges.iter().any(|e| &e.id == name) {
                    return Err(ValidationError::MissingReference {
                        id: name.clone(),
                        context: "regions.labels".to_string(),
                    });
                }
            }
            edges
                .iter()
                .map(|e| {
                    map.get(&e.id).copied().ok_or_else(|| {
                        invalid("regions.labels", &e.id, "edge has no region label")
                    })
                })
                .collect::<Result<_, _>>()?
        }
    };

    if let Some(&label) = values.iter().find(|&&l| l >= edges.len()) {
        return Err(invalid(
            "regions.labels",
            label,
            "a label cannot exceed the number of edges",
        ));
    }
    let n_regions = labels.n_regions();
    let used: HashSet<usize> = values.iter().copied().collect();
    if let Some(missing) = (0..n_regions).find(|r| !used.contains(r)) {
        return Err(invalid(
            "regions.labels",
            missing,
            "labels must cover 0..n_regions without gaps",
        ));
    }
    Ok(n_regions)
}

fn validate_mfd(mfd: &MfdDef, n_regions: usize) -> Result<(), ValidationError> {
    if mfd.degree < 2 {
        return Err(invalid("mfd.degree", mfd.degree, "must be at least 2"));
    }
    if mfd.n_pwa < 2 || mfd.n_pwa % 2 != 0 {
        return Err(invalid("mfd.n_pwa", mfd.n_pwa, "must be even and at least 2"));
    }
    match (&mfd.samples, &mfd.calibration) {
        (Some(samples), None) => {
            let samples = resolved(samples, "mfd.samples")?;
            if samples.len() != n_regions {
                return Err(invalid(
                    "mfd.samples",
                    samples.len(),
                    "need one sample set per region",
                ));
            }
            for (region, set) in samples.iter().enumerate() {
                if set.density.len() != set.flow.len() {
                    return Err(invalid(
                        format!("mfd.samples[{region}]"),
                        set.flow.len(),
                        "density and flow lengths differ",
                    ));
                }
            }
        }
        (None, Some(calibration)) => {
            positive("mfd.calibration.end_s", calibration.end_s)?;
            positive("mfd.calibration.interval_s", calibration.interval_s)?;
        }
        _ => {
            return Err(invalid(
                "mfd",
                "samples/calibration",
                "exactly one of samples or calibration is required",
            ));
        }
    }
    Ok(())
}

fn validate_routing(routing: &RoutingDef, n_regions: usize) -> Result<(), ValidationError> {
    match routing {
        RoutingDef::Uniform { fraction } => {
            if !(0.0..=1.0).contains(fraction) {
                return Err(invalid("routing.fraction", fraction, "must lie in [0, 1]"));
            }
        }
        RoutingDef::Matrix { rows } => {
            if rows.len() != n_regions {
                return Err(invalid("routing.rows", rows.len(), "need one row per region"));
            }
            for (i, row) in rows.iter().enumerate() {
                if row.len() != n_regions {
                    return Err(invalid(
                        format!("routing.rows[{i}]"),
                        row.len(),
                        "need one column per region",
                    ));
                }
                if row.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    return Err(invalid(format!("routing.rows[{i}]"), format!("{row:?}"), "fractions must lie in [0, 1]"));
                }
                let sum: f64 = row.iter().sum();
                if sum > 1.0 + 1e-12 {
                    return Err(invalid(format!("routing.rows[{i}]"), sum, "row sum exceeds 1"));
                }
            }
        }
        RoutingDef::Isolated => {}
    }
    Ok(())
}

fn validate_demand(od: &[Vec<Vec<f64>>], n_regions: usize) -> Result<(), ValidationError> {
    if od.len() != n_regions || od.iter().any(|row| row.len() != n_regions) {
        return Err(invalid("demand.od", od.len(), "must be n_regions x n_regions x slots"));
    }
    let n_slots = od.first().and_then(|row| row.first()).map_or(0, Vec::len);
    for series in od.iter().flatten() {
        if series.len() != n_slots {
            return Err(invalid("demand.od", series.len(), "all series need the same slot count"));
        }
        if series.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(invalid("demand.od", "entry", "must be finite and non-negative"));
        }
    }
    Ok(())
}

fn validate_actuators(actuators: &ActuatorsDef, edge_ids: &HashSet<&str>) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for placement in &actuators.placements {
        if !names.insert(placement.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: placement.name.clone(),
                context: "actuator placements".to_string(),
            });
        }
        if !edge_ids.contains(placement.edge.as_str()) {
            return Err(ValidationError::MissingReference {
                id: placement.edge.clone(),
                context: format!("placement of actuator '{}'", placement.name),
            });
        }
    }
    if let Some(bounds) = actuators.bounds
        && !(bounds.lower.is_finite() && bounds.upper.is_finite() && bounds.lower <= bounds.upper)
    {
        return Err(invalid(
            "actuators.bounds",
            format!("[{}, {}]", bounds.lower, bounds.upper),
            "need finite lower <= upper",
        ));
    }
    Ok(())
}

fn validate_control(control: &ControlDef, n_regions: usize) -> Result<(), ValidationError> {
    positive("control.cycle_s", control.cycle_s)?;
    if !(control.begin_s.is_finite() && control.begin_s >= 0.0) {
        return Err(invalid("control.begin_s", control.begin_s, "must be non-negative"));
    }
    if !(control.end_s > control.begin_s) {
        return Err(invalid("control.end_s", control.end_s, "must be after begin_s"));
    }
    if control.end_s - control.begin_s < control.cycle_s {
        return Err(invalid("control.end_s", control.end_s, "shorter than one control cycle"));
    }
    if control.reference_horizon == 0 {
        return Err(invalid("control.reference_horizon", 0, "must be positive"));
    }
    if let Some(weights) = &control.error_weights {
        let expected = control.output.n_outputs(n_regions);
        if weights.len() != expected {
            return Err(invalid(
                "control.error_weights",
                weights.len(),
                "need one weight per output",
            ));
        }
        for &w in weights {
            positive("control.error_weights", w)?;
        }
    }
    Ok(())
}
