/// Phase of a run as reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadingTask,
    CheckingCache,
    LoadingCachedResult,
    Calibrating,
    FittingMfd,
    BuildingModel,
    RunningControl,
    SavingResults,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlProgress {
    pub cycle: usize,
    pub n_cycles: usize,
    pub sim_time_s: f64,
    pub fraction_complete: f64,
    pub tracking_error: f64,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub control: Option<ControlProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            control: None,
        }
    }
}

impl From<&rf_sim::CycleReport> for ControlProgress {
    fn from(report: &rf_sim::CycleReport) -> Self {
        let fraction_complete = if report.n_cycles == 0 {
            1.0
        } else {
            (report.cycle + 1) as f64 / report.n_cycles as f64
        };
        Self {
            cycle: report.cycle,
            n_cycles: report.n_cycles,
            sim_time_s: report.time_s,
            fraction_complete,
            tracking_error: report.error,
        }
    }
}
