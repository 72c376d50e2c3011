use catalog::FunctionName;
use scheduler::{PhaseChange, TransitionScheduler};

/// Everything a backend needs to evaluate one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    /// Host clock in seconds, shared by every cell of the frame.
    pub time: f32,
    pub from: FunctionName,
    pub to: FunctionName,
    /// Eased blend weight; `None` while steady.
    pub progress: Option<f32>,
}

impl FrameSample {
    pub fn steady(function: FunctionName, time: f32) -> Self {
        Self {
            time,
            from: function,
            to: function,
            progress: None,
        }
    }

    pub fn from_scheduler(scheduler: &TransitionScheduler, time: f32) -> Self {
        let (from, to) = scheduler.active_pair();
        Self {
            time,
            from,
            to,
            progress: scheduler.blend_progress(),
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.progress.is_some()
    }
}

pub fn log_phase_change(change: &PhaseChange, time: f32) {
    match change {
        PhaseChange::Began { from, to } => {
            tracing::info!(time = format_args!("{time:.3}"), %from, %to, "transition started");
        }
        PhaseChange::Finished { function } => {
            tracing::info!(time = format_args!("{time:.3}"), %function, "transition finished");
        }
    }
}

/// Lifecycle violations shared by the CPU and GPU backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("backend is already active")]
    AlreadyActive,
    #[error("backend is not active; call activate first")]
    Inactive,
    #[error("resolution cannot change while active; deactivate first")]
    ResizeWhileActive,
    #[error("resolution {requested} is outside {min}..={max}")]
    Resolution { requested: u32, min: u32, max: u32 },
    #[error("function '{0}' is not part of the kernel table")]
    UnknownFunction(FunctionName),
    #[error("shader binding '{0}' is missing or has an unexpected layout")]
    Binding(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{FunctionCatalog, TransitionMode};
    use scheduler::TransitionTimings;

    #[test]
    fn sample_follows_scheduler_phase() {
        let mut scheduler = TransitionScheduler::new(
            FunctionCatalog::new(),
            TransitionMode::Cycle,
            TransitionTimings::new(1.0, 1.0).unwrap(),
            FunctionName::Ripple,
            3,
        )
        .unwrap();
        let sample = FrameSample::from_scheduler(&scheduler, 4.0);
        assert_eq!(sample, FrameSample::steady(FunctionName::Ripple, 4.0));

        scheduler.advance(1.5);
        let sample = FrameSample::from_scheduler(&scheduler, 5.5);
        assert_eq!(sample.from, FunctionName::Ripple);
        assert_eq!(sample.to, FunctionName::Sphere);
        assert_eq!(sample.progress, Some(0.5));
        assert!(sample.is_transitioning());
    }
}
