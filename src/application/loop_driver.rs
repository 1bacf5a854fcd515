//! Async driver for the convergence loop.
//!
//! Interprets the commands emitted by [`super::engine::step`] and performs
//! all IO: agent calls with explicit timeouts, CI lookups, cost events,
//! state persistence after every iteration, and the terminal announcement
//! (comment, optional merge, optional notification).
//!
//! Within one change the loop is strictly sequential; the only suspension
//! points are the awaited collaborator calls. Cancellation is cooperative
//! and only observed at the top of an iteration, never mid-call.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChangeContext, CiStatus, Config, ExhaustionReason, IterationPhase, IterationRecord,
    IterationState, MergeDecision, QualityMetrics, ReviewResult,
};
use crate::domain::ports::{
    CheckerAgent, CostStore, MakerAgent, Notifier, NotifierEvent, SourceControl, StateRepository,
};
use crate::services::{
    ConvergenceDetector, CostLedger, IterationLimiter, QualityGates, QualityScorer, StartDenial,
};

use super::engine::{step, LoopEvent};

/// Collaborator and storage handles the driver runs against.
///
/// An explicit context object, passed in by the composition root; no
/// process-wide singletons.
#[derive(Clone)]
pub struct LoopDeps {
    pub checker: Arc<dyn CheckerAgent>,
    pub maker: Arc<dyn MakerAgent>,
    pub source_control: Arc<dyn SourceControl>,
    pub state_repo: Arc<dyn StateRepository>,
    pub cost_store: Arc<dyn CostStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Final result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub state: IterationState,
    /// Gate verdict from the last completed review; absent when the run
    /// terminated before any review completed.
    pub decision: Option<MergeDecision>,
}

/// Drives one change's maker/checker loop end to end.
pub struct LoopDriver {
    deps: LoopDeps,
    config: Config,
    scorer: QualityScorer,
    detector: ConvergenceDetector,
    limiter: IterationLimiter,
    ledger: CostLedger,
    gates: QualityGates,
    shutdown_tx: broadcast::Sender<()>,
}

impl LoopDriver {
    pub fn new(deps: LoopDeps, config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let ledger = CostLedger::new(Arc::clone(&deps.cost_store), config.cost.clone());
        Self {
            scorer: QualityScorer::new(),
            detector: ConvergenceDetector::new(&config.convergence),
            limiter: IterationLimiter::new(&config.limits, &config.cost),
            gates: QualityGates::new(
                config.thresholds.clone(),
                config.approval.clone(),
                config.advisory.clone(),
                &config.cost,
            ),
            ledger,
            deps,
            config,
            shutdown_tx,
        }
    }

    /// Handle for requesting a cooperative stop from another task.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the loop for one change until a terminal phase is reached.
    pub async fn run(
        &self,
        owner: &str,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<LoopOutcome> {
        let context = self
            .deps
            .source_control
            .get_context(owner, repository, change_id)
            .await?;
        let repo_key = format!("{owner}/{repository}");

        let mut state = match self.deps.state_repo.load(&repo_key, change_id).await? {
            Some(existing) if existing.is_terminal() => {
                warn!(
                    repository = %repo_key,
                    change_id,
                    phase = existing.phase.name(),
                    "change already terminal; comment `retry` to restart"
                );
                return Ok(LoopOutcome {
                    state: existing,
                    decision: None,
                });
            }
            Some(existing) => {
                info!(
                    repository = %repo_key,
                    change_id,
                    iteration = existing.current_iteration,
                    "resuming from persisted state"
                );
                existing
            }
            None => IterationState::new(
                repo_key.clone(),
                change_id,
                self.config.limits.max_iterations,
            ),
        };

        info!(
            repository = %repo_key,
            change_id,
            run_id = %state.run_id,
            max_iterations = state.max_iterations,
            "starting convergence loop"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut last_review: Option<ReviewResult> = None;
        let mut last_metrics: Option<QualityMetrics> = None;
        let mut last_ci = CiStatus::Pending;

        loop {
            // Cooperative cancellation, observed only between iterations.
            if shutdown_rx.try_recv().is_ok() {
                info!(repository = %repo_key, change_id, "stop requested; exhausting run");
                self.exhaust(&mut state, ExhaustionReason::Stopped).await?;
                break;
            }

            if let Err(denial) = self.limiter.can_start_iteration(&state) {
                match denial {
                    StartDenial::TerminalPhase { .. } => break,
                    StartDenial::IterationCapReached { .. } => {
                        self.exhaust(&mut state, ExhaustionReason::MaxIterations)
                            .await?;
                        break;
                    }
                    StartDenial::CostCapReached { .. } => {
                        self.exhaust(&mut state, ExhaustionReason::CostCapReached)
                            .await?;
                        break;
                    }
                }
            }

            // The limiter only sees this run's in-memory total; the ledger
            // replay also covers spend persisted by earlier runs of the
            // same change.
            if self
                .ledger
                .has_exceeded_change_cap(&repo_key, change_id)
                .await?
            {
                warn!(
                    repository = %repo_key,
                    change_id,
                    cap = self.ledger.change_cap(),
                    "per-change cost cap already exceeded in the ledger"
                );
                self.exhaust(&mut state, ExhaustionReason::CostCapReached)
                    .await?;
                break;
            }

            let period = self.ledger.check_period_cap().await?;
            if period.exceeded {
                warn!(period = %period.period, total = period.total, "billing-period cap exceeded");
                self.notify(NotifierEvent::CostWarning {
                    period: period.period.clone(),
                    total: period.total,
                    limit: period.limit,
                })
                .await;
                self.exhaust(&mut state, ExhaustionReason::PeriodCapReached)
                    .await?;
                break;
            }
            if period.warning {
                warn!(
                    period = %period.period,
                    percentage = format!("{:.0}%", period.percentage),
                    "billing-period spend past warning level"
                );
            }

            if state.phase == IterationPhase::Idle {
                self.apply(&mut state, LoopEvent::Start)?;
            }

            let iteration = state.current_iteration + 1;
            let started = Instant::now();
            debug!(repository = %repo_key, change_id, iteration, "invoking checker");

            let review = match self.call_checker(&context, iteration).await {
                Ok(review) => review,
                Err(err) => {
                    self.fail(&mut state, &context, &err).await?;
                    break;
                }
            };
            if review.status == crate::domain::models::AgentStatus::Error {
                // The agent ran but reported failure. Maker is never invoked.
                self.record_cost(&state, iteration, review.cost, 0.0).await;
                let err = DomainError::Collaborator {
                    agent: "checker".to_string(),
                    iteration,
                    message: "agent reported error status".to_string(),
                };
                self.fail(&mut state, &context, &err).await?;
                break;
            }

            let metrics = self.scorer.score(&review);
            let ci = match self
                .deps
                .source_control
                .get_ci_status(&context.head_ref)
                .await
            {
                Ok(status) => status,
                Err(err) => {
                    warn!(error = %err, "CI status lookup failed; treating as error state");
                    CiStatus::Error
                }
            };
            debug!(
                iteration,
                overall = metrics.overall,
                weighted = metrics.weighted,
                issues = review.issues.len(),
                ci = ci.as_str(),
                "review scored"
            );

            // Convergence tracks the overall penalty score, the same figure
            // recorded in history; the gates separately apply the
            // category-weighted score.
            let converged = metrics.overall >= self.gates.quality_threshold()
                && review.blocking_issues().is_empty()
                && ci == CiStatus::Success;

            if converged {
                let record = self.build_record(&state, iteration, &review, &metrics, None, started);
                state.record_iteration(record)?;
                self.record_cost(&state, iteration, review.cost, 0.0).await;
                self.apply(
                    &mut state,
                    LoopEvent::ReviewPassed {
                        final_score: metrics.overall,
                    },
                )?;
                last_review = Some(review);
                last_metrics = Some(metrics);
                last_ci = ci;
                break;
            }

            // Fix round.
            self.apply(&mut state, LoopEvent::ReviewNeedsFixes)?;
            let fix = match self.call_maker(&context, &review, iteration).await {
                Ok(fix) => fix,
                Err(err) => {
                    self.record_cost(&state, iteration, review.cost, 0.0).await;
                    self.fail(&mut state, &context, &err).await?;
                    break;
                }
            };
            if fix.status == crate::domain::models::AgentStatus::Error {
                self.record_cost(&state, iteration, review.cost, fix.cost)
                    .await;
                let err = DomainError::Collaborator {
                    agent: "maker".to_string(),
                    iteration,
                    message: "agent reported error status".to_string(),
                };
                self.fail(&mut state, &context, &err).await?;
                break;
            }

            let maker_summary = format!(
                "modified {} file(s), addressed {} issue(s)",
                fix.files_modified.len(),
                fix.issues_addressed
            );
            let mut record =
                self.build_record(&state, iteration, &review, &metrics, Some(maker_summary), started);
            record.issues_fixed = fix.issues_addressed;
            record.cost += fix.cost;
            state.record_iteration(record)?;
            self.record_cost(&state, iteration, review.cost, fix.cost)
                .await;

            let scores = state.score_history();
            let issue_counts = state.issue_count_history();
            let assessment = self
                .detector
                .assess(&scores, &issue_counts, !review.low_confidence);
            state.set_convergence_status(assessment.status)?;
            info!(
                iteration,
                status = assessment.status.as_str(),
                confidence = assessment.confidence,
                reason = %assessment.reason,
                "convergence assessed"
            );

            let remaining = state.max_iterations - state.current_iteration;
            let projection = self.detector.project(
                &scores,
                state.latest_score,
                self.gates.quality_threshold(),
                remaining,
            );
            if !projection.within_budget {
                warn!(
                    remaining,
                    confidence = projection.confidence,
                    reason = %projection.reason,
                    "threshold unlikely to be reached within the remaining budget"
                );
            }

            for pattern in self.limiter.scan_for_suspicious_patterns(&state) {
                warn!(repository = %repo_key, change_id, "suspicious pattern: {pattern}");
            }

            let stagnant_streak = self.detector.consecutive_stagnant(&scores, &issue_counts);
            let below_threshold = state.latest_score < self.gates.quality_threshold();
            if below_threshold && stagnant_streak >= self.config.convergence.stagnation_limit {
                info!(
                    streak = stagnant_streak,
                    score = state.latest_score,
                    "stagnant below threshold; stopping"
                );
                self.apply(&mut state, LoopEvent::StagnationDetected)?;
                last_review = Some(review);
                last_metrics = Some(metrics);
                last_ci = ci;
                self.deps.state_repo.save(&state).await?;
                break;
            }

            self.apply(&mut state, LoopEvent::FixApplied)?;
            last_review = Some(review);
            last_metrics = Some(metrics);
            last_ci = ci;
            self.deps.state_repo.save(&state).await?;
        }

        self.deps.state_repo.save(&state).await?;

        let decision = match (&last_review, &last_metrics) {
            (Some(review), Some(metrics)) => {
                Some(self.gates.evaluate(&state, review, metrics, last_ci))
            }
            _ => None,
        };

        self.finalize(&context, &state, decision.as_ref()).await;

        Ok(LoopOutcome { state, decision })
    }

    /// Apply one engine event to the live state, skipping no-op phase moves.
    fn apply(&self, state: &mut IterationState, event: LoopEvent) -> DomainResult<()> {
        let (next, _command) = step(&state.phase, event)?;
        if next != state.phase {
            state.transition(next)?;
        }
        Ok(())
    }

    async fn call_checker(
        &self,
        context: &ChangeContext,
        iteration: u32,
    ) -> DomainResult<ReviewResult> {
        let timeout_secs = self.config.limits.collaborator_timeout_secs;
        match timeout(
            StdDuration::from_secs(timeout_secs),
            self.deps.checker.review(context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::CollaboratorTimeout {
                agent: "checker".to_string(),
                iteration,
                timeout_secs,
            }),
        }
    }

    async fn call_maker(
        &self,
        context: &ChangeContext,
        review: &ReviewResult,
        iteration: u32,
    ) -> DomainResult<crate::domain::models::FixResult> {
        let timeout_secs = self.config.limits.collaborator_timeout_secs;
        match timeout(
            StdDuration::from_secs(timeout_secs),
            self.deps.maker.fix(context, &review.issues, iteration),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::CollaboratorTimeout {
                agent: "maker".to_string(),
                iteration,
                timeout_secs,
            }),
        }
    }

    fn build_record(
        &self,
        state: &IterationState,
        iteration: u32,
        review: &ReviewResult,
        metrics: &QualityMetrics,
        maker_summary: Option<String>,
        started: Instant,
    ) -> IterationRecord {
        let issues_found = u32::try_from(review.issues.len()).unwrap_or(u32::MAX);
        IterationRecord {
            iteration,
            checker_summary: format!(
                "score {:.2}, {} issue(s), {} blocking",
                metrics.overall,
                review.issues.len(),
                review.blocking_issues().len()
            ),
            maker_summary,
            issues_found,
            issues_fixed: 0,
            quality_score: metrics.overall,
            quality_delta: state.delta_from_latest(metrics.overall),
            cost: review.cost,
            timestamp: Utc::now(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Cost events are advisory accounting; a write failure is logged, never
    /// allowed to kill the run.
    async fn record_cost(
        &self,
        state: &IterationState,
        iteration: u32,
        checker_cost: f64,
        maker_cost: f64,
    ) {
        if let Err(err) = self
            .ledger
            .record_iteration(
                &state.repository,
                &state.change_id,
                iteration,
                checker_cost,
                maker_cost,
            )
            .await
        {
            warn!(error = %err, iteration, "failed to record cost event");
        }
    }

    async fn exhaust(
        &self,
        state: &mut IterationState,
        reason: ExhaustionReason,
    ) -> DomainResult<()> {
        info!(
            repository = %state.repository,
            change_id = %state.change_id,
            reason = %reason,
            iterations = state.current_iteration,
            cost = state.total_cost,
            "run exhausted"
        );
        self.apply(
            state,
            LoopEvent::LimitHit {
                reason: reason.clone(),
            },
        )?;
        self.deps.state_repo.save(state).await?;
        self.notify(NotifierEvent::Exhausted {
            repository: state.repository.clone(),
            change_id: state.change_id.clone(),
            reason,
            iterations: state.current_iteration,
            total_cost: state.total_cost,
        })
        .await;
        Ok(())
    }

    async fn fail(
        &self,
        state: &mut IterationState,
        context: &ChangeContext,
        err: &DomainError,
    ) -> DomainResult<()> {
        let message = err.to_string();
        warn!(
            repository = %state.repository,
            change_id = %state.change_id,
            error = %message,
            "run failed"
        );
        let event = match state.phase {
            IterationPhase::FixerRunning => LoopEvent::MakerErrored {
                error: message.clone(),
            },
            _ => LoopEvent::CheckerErrored {
                error: message.clone(),
            },
        };
        self.apply(state, event)?;
        self.deps.state_repo.save(state).await?;

        let comment = format!(
            "Convergence loop failed after {} iteration(s), ${:.2} spent: {message}",
            state.current_iteration, state.total_cost
        );
        if let Err(err) = self.deps.source_control.comment(context, &comment).await {
            warn!(error = %err, "failed to post failure comment");
        }
        self.notify(NotifierEvent::Failed {
            repository: state.repository.clone(),
            change_id: state.change_id.clone(),
            error: message,
            iterations: state.current_iteration,
            total_cost: state.total_cost,
        })
        .await;
        Ok(())
    }

    /// Post the run summary and act on the verdict. Announcement failures
    /// are logged; the terminal state is already persisted by this point.
    async fn finalize(
        &self,
        context: &ChangeContext,
        state: &IterationState,
        decision: Option<&MergeDecision>,
    ) {
        if let IterationPhase::Converged { final_score } = state.phase {
            self.notify(NotifierEvent::Converged {
                repository: state.repository.clone(),
                change_id: state.change_id.clone(),
                final_score,
                iterations: state.current_iteration,
                total_cost: state.total_cost,
            })
            .await;
        }

        let Some(decision) = decision else {
            return;
        };

        let summary = render_summary(state, decision);
        if let Err(err) = self.deps.source_control.comment(context, &summary).await {
            warn!(error = %err, "failed to post run summary comment");
        }

        if decision.auto_merge_eligible {
            info!(
                repository = %state.repository,
                change_id = %state.change_id,
                score = decision.quality_score,
                "auto-merge eligible; merging"
            );
            if let Err(err) = self.deps.source_control.merge(context).await {
                warn!(error = %err, "auto-merge failed");
            } else if let Err(err) = self
                .deps
                .source_control
                .label(context, "kaizen:auto-merged")
                .await
            {
                warn!(error = %err, "failed to apply auto-merge label");
            }
        } else if decision.requires_human_approval {
            if let Err(err) = self
                .deps
                .source_control
                .label(context, "kaizen:needs-human-review")
                .await
            {
                warn!(error = %err, "failed to apply review label");
            }
        }
    }

    async fn notify(&self, event: NotifierEvent) {
        if let Some(notifier) = &self.deps.notifier {
            if let Err(err) = notifier.send(event).await {
                warn!(error = %err, "notification delivery failed");
            }
        }
    }
}

/// Markdown run summary posted as a comment at termination.
fn render_summary(state: &IterationState, decision: &MergeDecision) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "## Convergence loop: {}\n\n",
        state.phase.name()
    ));
    out.push_str(&format!(
        "- Iterations: {}/{}\n- Final score: {:.2}\n- Total cost: ${:.2}\n- Verdict: {}\n",
        state.current_iteration,
        state.max_iterations,
        decision.quality_score,
        decision.total_cost,
        decision.reason
    ));
    if !decision.blocking_issues.is_empty() {
        out.push_str("\n### Blocking issues\n");
        for issue in &decision.blocking_issues {
            out.push_str(&format!(
                "- [{}] {} {}\n",
                issue.severity.as_str(),
                issue.location,
                issue.message
            ));
        }
    }
    if !decision.approval_triggers.is_empty() {
        out.push_str("\n### Human approval required\n");
        for trigger in &decision.approval_triggers {
            out.push_str(&format!("- {trigger}\n"));
        }
    }
    if !decision.warnings.is_empty() {
        out.push_str("\n### Advisory\n");
        for warning in &decision.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }
    out
}
