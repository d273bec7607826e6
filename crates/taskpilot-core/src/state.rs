use serde::{Deserialize, Serialize};

/// States of the plan/approve/execute/refine loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingTask,
    Generating,
    AwaitingApproval,
    Materializing,
    Executing,
    AwaitingOutcomeJudgment,
    AwaitingFeedback,
    Succeeded,
    AbortedByUser,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Succeeded | LoopState::AbortedByUser)
    }

    /// Whether the loop may move from `self` to `next`
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::{
            AbortedByUser, AwaitingApproval, AwaitingFeedback, AwaitingOutcomeJudgment,
            AwaitingTask, Executing, Generating, Materializing, Succeeded,
        };

        // An abort request can end the loop at any waiting point
        if next == AbortedByUser {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (AwaitingTask, Generating)
                | (Generating, AwaitingApproval)
                | (AwaitingApproval, Materializing)
                | (Materializing, Executing)
                | (Materializing, AwaitingFeedback)
                | (Executing, AwaitingOutcomeJudgment)
                | (Executing, AwaitingFeedback)
                | (AwaitingOutcomeJudgment, Succeeded)
                | (AwaitingOutcomeJudgment, AwaitingFeedback)
                | (AwaitingFeedback, Generating)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoopState::AwaitingTask => "awaiting_task",
            LoopState::Generating => "generating",
            LoopState::AwaitingApproval => "awaiting_approval",
            LoopState::Materializing => "materializing",
            LoopState::Executing => "executing",
            LoopState::AwaitingOutcomeJudgment => "awaiting_outcome_judgment",
            LoopState::AwaitingFeedback => "awaiting_feedback",
            LoopState::Succeeded => "succeeded",
            LoopState::AbortedByUser => "aborted_by_user",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::LoopState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            AwaitingTask,
            Generating,
            AwaitingApproval,
            Materializing,
            Executing,
            AwaitingOutcomeJudgment,
            Succeeded,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_refinement_transitions() {
        assert!(Materializing.can_transition_to(AwaitingFeedback));
        assert!(Executing.can_transition_to(AwaitingFeedback));
        assert!(AwaitingOutcomeJudgment.can_transition_to(AwaitingFeedback));
        assert!(AwaitingFeedback.can_transition_to(Generating));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!AwaitingApproval.can_transition_to(Executing));
        assert!(!Generating.can_transition_to(Materializing));
        assert!(!Executing.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Generating));
        assert!(!Succeeded.can_transition_to(AbortedByUser));
    }

    #[test]
    fn test_abort_allowed_from_any_live_state() {
        for state in [AwaitingTask, Generating, AwaitingApproval, Executing, AwaitingFeedback] {
            assert!(state.can_transition_to(AbortedByUser));
        }
    }
}
