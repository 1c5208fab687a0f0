//! Auto-stake pipeline state and its reducer.
//!
//! The state is only ever produced by [`reduce`], which enforces the fixed
//! step order: a step may start only once every earlier step finished
//! without error, and nothing moves after the pipeline halted.

use {
    serde::{Deserialize, Serialize},
    stakeflow_common::{OrchestrationStep, StepKey, StepStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub steps: Vec<OrchestrationStep>,
    /// Terminal error for the whole run, set on any step failure or abort.
    pub error: Option<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            steps: StepKey::ALL.iter().copied().map(OrchestrationStep::pending).collect(),
            error: None,
        }
    }
}

impl PipelineState {
    pub fn step(&self, key: StepKey) -> &OrchestrationStep {
        &self.steps[key.index()]
    }

    pub fn status(&self, key: StepKey) -> StepStatus {
        self.step(key).status
    }

    pub fn is_halted(&self) -> bool {
        self.error.is_some()
    }

    /// Every step done or skipped.
    pub fn is_complete(&self) -> bool {
        !self.is_halted()
            && self
                .steps
                .iter()
                .all(|step| matches!(step.status, StepStatus::Done | StepStatus::Skipped))
    }

    pub fn running(&self) -> Option<StepKey> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Running)
            .map(|step| step.key)
    }

    fn can_start(&self, key: StepKey) -> bool {
        self.status(key) == StepStatus::Pending
            && self.steps[..key.index()]
                .iter()
                .all(|step| matches!(step.status, StepStatus::Done | StepStatus::Skipped))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Reset,
    Started(StepKey),
    Progress(StepKey, String),
    Completed(StepKey, Option<String>),
    Skipped(StepKey, String),
    Failed(StepKey, String),
    /// Failure not attributable to a single step.
    Aborted(String),
}

/// Events that would break ordering are ignored.
pub fn reduce(mut state: PipelineState, event: &PipelineEvent) -> PipelineState {
    if let PipelineEvent::Reset = event {
        return PipelineState::default();
    }
    if state.is_halted() {
        return state;
    }

    match event {
        PipelineEvent::Reset => {}
        PipelineEvent::Started(key) => {
            if state.can_start(*key) {
                let step = &mut state.steps[key.index()];
                step.status = StepStatus::Running;
                step.detail = None;
            }
        }
        PipelineEvent::Progress(key, detail) => {
            let step = &mut state.steps[key.index()];
            if step.status == StepStatus::Running {
                step.detail = Some(detail.clone());
            }
        }
        PipelineEvent::Completed(key, detail) => {
            finish(&mut state, *key, StepStatus::Done, detail.clone());
        }
        PipelineEvent::Skipped(key, reason) => {
            finish(&mut state, *key, StepStatus::Skipped, Some(reason.clone()));
        }
        PipelineEvent::Failed(key, message) => {
            if finish(&mut state, *key, StepStatus::Error, Some(message.clone())) {
                state.error = Some(message.clone());
            }
        }
        PipelineEvent::Aborted(message) => {
            if state.running().is_none() {
                state.error = Some(message.clone());
            }
        }
    }
    state
}

fn finish(state: &mut PipelineState, key: StepKey, status: StepStatus, detail: Option<String>) -> bool {
    let step = &mut state.steps[key.index()];
    if step.status != StepStatus::Running {
        return false;
    }
    step.status = status;
    step.detail = detail;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(events: &[PipelineEvent]) -> PipelineState {
        events
            .iter()
            .fold(PipelineState::default(), |state, event| reduce(state, event))
    }

    #[test]
    fn test_initial_state_all_pending() {
        let state = PipelineState::default();
        assert_eq!(state.steps.len(), 4);
        assert!(state.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(state.steps[0].key, StepKey::Switch);
        assert_eq!(state.steps[3].key, StepKey::Stake);
    }

    #[test]
    fn test_happy_path() {
        use PipelineEvent::*;
        let state = apply(&[
            Started(StepKey::Switch),
            Skipped(StepKey::Switch, "Already on chain 80002".into()),
            Started(StepKey::Swap),
            Skipped(StepKey::Swap, "Already have enough tokens".into()),
            Started(StepKey::Approve),
            Progress(StepKey::Approve, "Waiting for confirmation".into()),
            Completed(StepKey::Approve, None),
            Started(StepKey::Stake),
            Completed(StepKey::Stake, Some("Staked".into())),
        ]);
        assert!(state.is_complete());
        assert_eq!(state.status(StepKey::Approve), StepStatus::Done);
        assert_eq!(state.step(StepKey::Approve).detail, None);
        assert_eq!(
            state.step(StepKey::Swap).detail.as_deref(),
            Some("Already have enough tokens")
        );
    }

    #[test]
    fn test_failure_halts_remaining_steps() {
        use PipelineEvent::*;
        let state = apply(&[
            Started(StepKey::Switch),
            Failed(StepKey::Switch, "Request rejected in wallet".into()),
            Started(StepKey::Swap),
            Started(StepKey::Approve),
            Started(StepKey::Stake),
        ]);
        assert_eq!(state.status(StepKey::Switch), StepStatus::Error);
        for key in [StepKey::Swap, StepKey::Approve, StepKey::Stake] {
            assert_eq!(state.status(key), StepStatus::Pending);
        }
        assert_eq!(state.error.as_deref(), Some("Request rejected in wallet"));
        assert!(!state.is_complete());
    }

    #[test]
    fn test_out_of_order_start_is_ignored() {
        use PipelineEvent::*;
        let state = apply(&[Started(StepKey::Approve), Completed(StepKey::Approve, None)]);
        assert_eq!(state, PipelineState::default());

        let state = apply(&[Started(StepKey::Switch), Started(StepKey::Swap)]);
        assert_eq!(state.status(StepKey::Swap), StepStatus::Pending);
        assert_eq!(state.running(), Some(StepKey::Switch));
    }

    #[test]
    fn test_finishing_a_pending_step_is_ignored() {
        let state = reduce(
            PipelineState::default(),
            &PipelineEvent::Failed(StepKey::Stake, "boom".into()),
        );
        assert_eq!(state, PipelineState::default());
    }

    #[test]
    fn test_abort_after_skipped_swap() {
        use PipelineEvent::*;
        let state = apply(&[
            Started(StepKey::Switch),
            Completed(StepKey::Switch, None),
            Started(StepKey::Swap),
            Skipped(StepKey::Swap, "No source token set".into()),
            Aborted("Insufficient balance: have 4, need 10".into()),
            Started(StepKey::Approve),
        ]);
        assert_eq!(state.status(StepKey::Swap), StepStatus::Skipped);
        assert_eq!(state.status(StepKey::Approve), StepStatus::Pending);
        assert!(state.is_halted());
    }

    #[test]
    fn test_reset_clears_a_halted_run() {
        use PipelineEvent::*;
        let state = apply(&[Started(StepKey::Switch), Failed(StepKey::Switch, "x".into()), Reset]);
        assert_eq!(state, PipelineState::default());
    }
}
