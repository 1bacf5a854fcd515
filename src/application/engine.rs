//! Pure state-machine core of the convergence loop.
//!
//! [`step`] maps (phase, event) to (next phase, command) with no IO at all.
//! The async driver in [`super::loop_driver`] interprets the commands it
//! emits; everything side-effecting (agent calls, comments, merges,
//! persistence) happens out there, which keeps every transition
//! unit-testable in isolation.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExhaustionReason, IterationPhase};

/// Something that happened to the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// A new iteration was cleared to start by the limiter.
    Start,
    /// The review met the threshold with no blocking issues and CI green.
    ReviewPassed { final_score: f64 },
    /// The review found issues and budget remains for a fix round.
    ReviewNeedsFixes,
    /// The Checker call itself failed.
    CheckerErrored { error: String },
    /// The Maker completed a fix round.
    FixApplied,
    /// The Maker call itself failed.
    MakerErrored { error: String },
    /// A hard ceiling fired (iteration cap, cost cap, operator stop).
    LimitHit { reason: ExhaustionReason },
    /// The detector reported stagnation past the configured streak while
    /// the score is still below threshold.
    StagnationDetected,
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    InvokeChecker,
    InvokeMaker,
    /// Terminal phase reached: persist, evaluate gates, announce.
    Finalize,
}

/// Advance the phase machine by one event.
///
/// Errors on any (phase, event) pair outside the transition graph; the
/// driver treats that as a bug, not a recoverable condition.
pub fn step(
    phase: &IterationPhase,
    event: LoopEvent,
) -> DomainResult<(IterationPhase, LoopCommand)> {
    use IterationPhase::{CheckerRunning, Converged, Exhausted, Failed, FixerRunning, Idle};

    let next = match (phase, event) {
        (Idle, LoopEvent::Start) => (CheckerRunning, LoopCommand::InvokeChecker),
        (CheckerRunning, LoopEvent::Start) => (CheckerRunning, LoopCommand::InvokeChecker),

        (CheckerRunning, LoopEvent::ReviewPassed { final_score }) => {
            (Converged { final_score }, LoopCommand::Finalize)
        }
        (CheckerRunning, LoopEvent::ReviewNeedsFixes) => {
            (FixerRunning, LoopCommand::InvokeMaker)
        }
        (CheckerRunning, LoopEvent::CheckerErrored { error }) => {
            (Failed { error }, LoopCommand::Finalize)
        }

        (FixerRunning, LoopEvent::FixApplied) => (CheckerRunning, LoopCommand::InvokeChecker),
        (FixerRunning, LoopEvent::MakerErrored { error }) => {
            (Failed { error }, LoopCommand::Finalize)
        }
        (FixerRunning, LoopEvent::StagnationDetected) => (
            Exhausted {
                reason: ExhaustionReason::Stagnation,
            },
            LoopCommand::Finalize,
        ),

        (Idle | CheckerRunning | FixerRunning, LoopEvent::LimitHit { reason }) => {
            (Exhausted { reason }, LoopCommand::Finalize)
        }

        (phase, event) => {
            return Err(DomainError::InvalidStateTransition {
                from: phase.name().to_string(),
                to: format!("{event:?}"),
                reason: "event not valid in this phase".to_string(),
            });
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_start_invokes_checker() {
        let (next, cmd) = step(&IterationPhase::Idle, LoopEvent::Start).unwrap();
        assert_eq!(next, IterationPhase::CheckerRunning);
        assert_eq!(cmd, LoopCommand::InvokeChecker);
    }

    #[test]
    fn passing_review_converges() {
        let (next, cmd) = step(
            &IterationPhase::CheckerRunning,
            LoopEvent::ReviewPassed { final_score: 0.91 },
        )
        .unwrap();
        assert_eq!(next, IterationPhase::Converged { final_score: 0.91 });
        assert_eq!(cmd, LoopCommand::Finalize);
    }

    #[test]
    fn failing_review_routes_to_maker_then_back() {
        let (fixer, cmd) =
            step(&IterationPhase::CheckerRunning, LoopEvent::ReviewNeedsFixes).unwrap();
        assert_eq!(fixer, IterationPhase::FixerRunning);
        assert_eq!(cmd, LoopCommand::InvokeMaker);

        let (checker, cmd) = step(&fixer, LoopEvent::FixApplied).unwrap();
        assert_eq!(checker, IterationPhase::CheckerRunning);
        assert_eq!(cmd, LoopCommand::InvokeChecker);
    }

    #[test]
    fn collaborator_errors_fail_the_run() {
        let (next, _) = step(
            &IterationPhase::CheckerRunning,
            LoopEvent::CheckerErrored {
                error: "socket closed".to_string(),
            },
        )
        .unwrap();
        assert!(matches!(next, IterationPhase::Failed { .. }));

        let (next, _) = step(
            &IterationPhase::FixerRunning,
            LoopEvent::MakerErrored {
                error: "process exited 1".to_string(),
            },
        )
        .unwrap();
        assert!(matches!(next, IterationPhase::Failed { .. }));
    }

    #[test]
    fn limit_hit_exhausts_from_any_non_terminal_phase() {
        for phase in [
            IterationPhase::Idle,
            IterationPhase::CheckerRunning,
            IterationPhase::FixerRunning,
        ] {
            let (next, cmd) = step(
                &phase,
                LoopEvent::LimitHit {
                    reason: ExhaustionReason::MaxIterations,
                },
            )
            .unwrap();
            assert_eq!(
                next,
                IterationPhase::Exhausted {
                    reason: ExhaustionReason::MaxIterations
                }
            );
            assert_eq!(cmd, LoopCommand::Finalize);
        }
    }

    #[test]
    fn stagnation_exhausts_after_fix_round() {
        let (next, _) =
            step(&IterationPhase::FixerRunning, LoopEvent::StagnationDetected).unwrap();
        assert_eq!(
            next,
            IterationPhase::Exhausted {
                reason: ExhaustionReason::Stagnation
            }
        );
    }

    #[test]
    fn events_outside_the_graph_are_rejected() {
        let err = step(&IterationPhase::Idle, LoopEvent::FixApplied).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let err = step(
            &IterationPhase::Converged { final_score: 0.9 },
            LoopEvent::Start,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
