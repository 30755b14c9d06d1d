//! Shared task fixtures.

use rf_controls::{ActuatorClass, ActuatorPlacement, BoundsPolicy, ControllerSpec, MpcConfig};
use rf_mfd::{MfdSamples, OutputKind};
use rf_project::*;

fn edge(id: &str, neighbors: &[&str]) -> EdgeDef {
    EdgeDef {
        id: id.to_string(),
        length_m: 250.0,
        lanes: 1,
        max_speed_mps: None,
        neighbors: neighbors.iter().map(|n| n.to_string()).collect(),
    }
}

fn samples(jam: f64) -> MfdSamples {
    let mut set = MfdSamples::default();
    for i in 0..8 {
        let x = jam * i as f64 / 8.0;
        set.push(x, 0.5 * x * (jam - x));
    }
    set
}

pub fn line_task() -> TaskConfig {
    TaskConfig {
        schema_version: LATEST_VERSION,
        name: "Three-edge line".to_string(),
        network: NetworkDef {
            edges: vec![edge("a", &["b"]), edge("b", &["c"]), edge("c", &[])],
            symmetric: true,
        },
        regions: RegionsDef {
            labels: Source::Inline(LabelsDef::Ordered(vec![0, 1, 1])),
        },
        mfd: MfdDef {
            degree: 2,
            n_pwa: 4,
            samples: Some(Source::Inline(vec![samples(100.0), samples(120.0)])),
            calibration: None,
        },
        routing: RoutingDef::Matrix {
            rows: vec![vec![0.0, 0.2], vec![0.1, 0.0]],
        },
        completion: CompletionDef::default(),
        demand: DemandDef {
            od: None,
            constant: Some(ConstantDemand {
                rates: vec![vec![0.0, 0.2], vec![0.1, 0.0]],
                slots: 600,
            }),
        },
        actuators: ActuatorsDef {
            class: ActuatorClass::SpeedLimit,
            policy: BoundsPolicy::Reject,
            bounds: Some(BoundsDef {
                lower: 0.8,
                upper: 1.2,
            }),
            placements: vec![ActuatorPlacement {
                name: "vsl".to_string(),
                edge: "b".to_string(),
            }],
        },
        controller: ControllerSpec::Mpc(MpcConfig::default()),
        control: ControlDef {
            begin_s: 0.0,
            end_s: 600.0,
            cycle_s: 60.0,
            output: OutputKind::DensityFlow,
            reference_horizon: 3,
            error_weights: Some(vec![1.0, 1.0, 0.5, 0.5]),
            seed: 5,
        },
        engine: EngineDef::default(),
    }
}
