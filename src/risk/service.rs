use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{dependency_repo, job_repo, task_repo, timestamp};
use crate::error::SiteopsError;
use crate::events::{EventSink, Notification};
use crate::graph::DependencyGraphService;
use crate::integrity::aggregate::summarize;
use crate::models::{
    DependencyStatus, EventPayload, NewTaskEvent, RiskLevel, TaskEventType, TaskStatus,
};

use super::{risk_level_for_delay, risk_level_for_score};

#[derive(Debug, Clone, Serialize)]
pub struct AffectedTask {
    pub task_id: String,
    pub title: String,
    pub depth: usize,
    pub dependency_id: String,
    pub risk_weight: f64,
    pub impact_minutes: f64,
    pub previous_risk_level: RiskLevel,
    pub new_risk_level: RiskLevel,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayPropagation {
    pub task_id: String,
    pub delay_minutes: f64,
    pub affected_tasks: Vec<AffectedTask>,
    pub total_impact_minutes: f64,
    pub total_impact_hours: f64,
    pub critical_path_affected: bool,
    pub mitigations: Vec<String>,
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedTask {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOption {
    pub action: &'static str,
    pub description: &'static str,
}

const RECOVERY_OPTIONS: [RecoveryOption; 4] = [
    RecoveryOption {
        action: "retry",
        description: "Retry the failed task once the cause is fixed",
    },
    RecoveryOption {
        action: "reassign",
        description: "Reassign the work to another crew",
    },
    RecoveryOption {
        action: "resequence",
        description: "Resequence downstream tasks that do not need the failed work",
    },
    RecoveryOption {
        action: "escalate",
        description: "Escalate to the site manager for a decision",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct FailurePropagation {
    pub task_id: String,
    pub violated_dependencies: Vec<String>,
    pub blocked_tasks: Vec<BlockedTask>,
    pub recovery_options: Vec<RecoveryOption>,
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactors {
    pub average_integrity: f64,
    pub integrity_points: f64,
    pub violated_dependencies: usize,
    pub violated_points: f64,
    pub blocked_tasks: usize,
    pub blocked_points: f64,
    pub overdue_tasks: usize,
    pub overdue_points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRisk {
    pub job_id: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub factors: RiskFactors,
}

fn capped_points(count: usize, per_item: f64, cap: f64) -> f64 {
    (count as f64 * per_item).min(cap)
}

fn mitigations(total_minutes: f64, critical_path_affected: bool, affected: usize) -> Vec<String> {
    let mut out = Vec::new();
    if total_minutes > 60.0 {
        out.push("Add workers to the affected tasks to recover time".to_string());
    }
    if critical_path_affected {
        out.push("Review the critical path and resequence where possible".to_string());
    }
    if total_minutes > 240.0 {
        out.push("Notify the client about the expected delay".to_string());
    }
    if affected > 0 {
        out.push("Reschedule downstream tasks to the new start times".to_string());
    }
    out
}

pub struct RiskPropagationService<'a> {
    conn: &'a Connection,
    events: &'a dyn EventSink,
    now: NaiveDateTime,
}

impl<'a> RiskPropagationService<'a> {
    pub fn new(conn: &'a Connection, events: &'a dyn EventSink) -> Self {
        Self {
            conn,
            events,
            now: timestamp::now(),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    fn graph(&self) -> DependencyGraphService<'a> {
        DependencyGraphService::new(self.conn).with_now(self.now)
    }

    /// Push a delay through every downstream edge, storing the resulting
    /// risk level on each. Impact is the delay scaled by the edge's weight.
    pub fn propagate_delay(&self, task_id: &str, delay_minutes: f64) -> Result<DelayPropagation, SiteopsError> {
        if !delay_minutes.is_finite() || delay_minutes < 0.0 {
            return Err(SiteopsError::validation(format!(
                "delay must be a non-negative number of minutes, got {delay_minutes}"
            )));
        }
        let task = task_repo::get_task_by_id(self.conn, task_id)?;

        let mut affected_tasks = Vec::new();
        for hit in self.graph().get_downstream_tasks(&task.id, None)? {
            let impact_minutes = delay_minutes * hit.risk_weight;
            let new_risk_level = risk_level_for_delay(impact_minutes);
            let previous = dependency_repo::get_dependency(self.conn, &hit.dependency_id)?;
            dependency_repo::update_risk_level(self.conn, &hit.dependency_id, new_risk_level)?;
            affected_tasks.push(AffectedTask {
                task_id: hit.task_id,
                title: hit.title,
                depth: hit.depth,
                dependency_id: hit.dependency_id,
                risk_weight: hit.risk_weight,
                impact_minutes,
                previous_risk_level: previous.current_risk_level,
                new_risk_level,
                is_critical: hit.is_critical,
            });
        }

        let total_impact_minutes: f64 = affected_tasks.iter().map(|a| a.impact_minutes).sum();
        let total_impact_hours = (total_impact_minutes / 60.0 * 100.0).round() / 100.0;
        let critical_path_affected = affected_tasks.iter().any(|a| a.is_critical);
        let mitigations = mitigations(total_impact_minutes, critical_path_affected, affected_tasks.len());

        tracing::info!(
            task_id = %task.id,
            delay_minutes,
            affected = affected_tasks.len(),
            total_impact_minutes,
            critical_path_affected,
            "delay propagated"
        );

        let payload = EventPayload::DelayPropagated {
            delay_minutes,
            total_impact_hours,
            affected_tasks: affected_tasks.iter().map(|a| a.task_id.clone()).collect(),
            critical_path_affected,
            mitigations: mitigations.clone(),
        };
        let notification = Notification::attempt(
            self.events,
            NewTaskEvent::new(&task.id, TaskEventType::DelayPropagated, payload).from_source("risk"),
        );

        Ok(DelayPropagation {
            task_id: task.id,
            delay_minutes,
            affected_tasks,
            total_impact_minutes,
            total_impact_hours,
            critical_path_affected,
            mitigations,
            notification,
        })
    }

    /// Break every hard edge downstream of a failed task and list the
    /// not-yet-started successors that can no longer begin.
    pub fn propagate_failure(&self, task_id: &str) -> Result<FailurePropagation, SiteopsError> {
        let task = task_repo::get_task_by_id(self.conn, task_id)?;

        let mut violated_dependencies = Vec::new();
        let mut blocked_tasks = Vec::new();
        for hit in self.graph().get_downstream_tasks(&task.id, None)? {
            if !hit.is_hard {
                continue;
            }
            dependency_repo::mark_violated(self.conn, &hit.dependency_id, self.now)?;
            violated_dependencies.push(hit.dependency_id);
            if hit.status.is_not_started() {
                blocked_tasks.push(BlockedTask {
                    task_id: hit.task_id,
                    title: hit.title,
                    status: hit.status,
                });
            }
        }

        tracing::info!(
            task_id = %task.id,
            violated = violated_dependencies.len(),
            blocked = blocked_tasks.len(),
            "failure propagated"
        );

        let payload = EventPayload::FailurePropagated {
            violated_dependencies: violated_dependencies.clone(),
            blocked_tasks: blocked_tasks.iter().map(|b| b.task_id.clone()).collect(),
        };
        let notification = Notification::attempt(
            self.events,
            NewTaskEvent::new(&task.id, TaskEventType::FailurePropagated, payload).from_source("risk"),
        );

        Ok(FailurePropagation {
            task_id: task.id,
            violated_dependencies,
            blocked_tasks,
            recovery_options: RECOVERY_OPTIONS.to_vec(),
            notification,
        })
    }

    pub fn calculate_job_risk_score(&self, job_id: &str) -> Result<JobRisk, SiteopsError> {
        let job = job_repo::get_job_by_id(self.conn, job_id)?;
        let tasks = task_repo::list_tasks_by_job(self.conn, &job.id)?;
        let deps = dependency_repo::list_for_job(self.conn, &job.id)?;

        let average_integrity = summarize(&tasks).average_score;
        let violated_dependencies = deps.iter().filter(|d| d.status == DependencyStatus::Violated).count();
        let blocked_tasks = tasks.iter().filter(|t| t.status == TaskStatus::Blocked).count();
        let overdue_tasks = tasks.iter().filter(|t| t.is_overdue(self.now)).count();

        let factors = RiskFactors {
            average_integrity,
            integrity_points: (100.0 - average_integrity).max(0.0) * 0.3,
            violated_dependencies,
            violated_points: capped_points(violated_dependencies, 10.0, 30.0),
            blocked_tasks,
            blocked_points: capped_points(blocked_tasks, 5.0, 15.0),
            overdue_tasks,
            overdue_points: capped_points(overdue_tasks, 5.0, 15.0),
        };
        let raw = factors.integrity_points + factors.violated_points + factors.blocked_points + factors.overdue_points;
        let risk_score = (raw.min(100.0) * 10.0).round() / 10.0;

        Ok(JobRisk {
            job_id: job.id,
            risk_score,
            risk_level: risk_level_for_score(risk_score),
            factors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::event_repo;
    use crate::error::ErrorCode;
    use crate::events::tests::FailingSink;
    use crate::events::TaskEventService;
    use crate::models::{NewDependency, Task};
    use crate::testing::Fixture;

    fn weighted(fx: &Fixture, from: &Task, to: &Task, weight: f64, critical: bool) {
        let mut dep = NewDependency::finish_to_start(&from.id, &to.id);
        dep.risk_weight = weight;
        dep.is_critical = critical;
        fx.dep_with(dep);
    }

    #[test]
    fn half_weight_edge_halves_the_delay() {
        let fx = Fixture::new();
        let job = fx.job("Terrace");
        let a = fx.task(&job, "Grade");
        let b = fx.task(&job, "Pave");
        weighted(&fx, &a, &b, 0.5, false);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = RiskPropagationService::new(&fx.conn, &sink).with_now(fx.now);
        let result = service.propagate_delay(&a.id, 100.0).unwrap();

        assert_eq!(result.affected_tasks.len(), 1);
        let hit = &result.affected_tasks[0];
        assert_eq!(hit.impact_minutes, 50.0);
        assert_eq!(hit.new_risk_level, RiskLevel::Medium);
        assert_eq!(hit.previous_risk_level, RiskLevel::Low);
        assert!(!result.critical_path_affected);

        let stored = dependency_repo::get_dependency(&fx.conn, &hit.dependency_id).unwrap();
        assert_eq!(stored.current_risk_level, RiskLevel::Medium);
        assert!(matches!(result.notification, Notification::Emitted { .. }));
        let events = event_repo::list_for_task(&fx.conn, &a.id).unwrap();
        assert_eq!(events[0].event_type, TaskEventType::DelayPropagated);
    }

    #[test]
    fn cascade_totals_and_mitigations() {
        let fx = Fixture::new();
        let job = fx.job("Pool");
        let a = fx.task(&job, "Excavate");
        let b = fx.task(&job, "Shell");
        let c = fx.task(&job, "Tile");
        weighted(&fx, &a, &b, 1.0, true);
        weighted(&fx, &b, &c, 1.0, false);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = RiskPropagationService::new(&fx.conn, &sink).with_now(fx.now);
        let result = service.propagate_delay(&a.id, 150.0).unwrap();

        assert_eq!(result.total_impact_minutes, 300.0);
        assert_eq!(result.total_impact_hours, 5.0);
        assert!(result.critical_path_affected);
        assert!(result
            .affected_tasks
            .iter()
            .all(|t| t.new_risk_level == RiskLevel::Critical));
        assert_eq!(result.mitigations.len(), 4);
    }

    #[test]
    fn no_downstream_means_no_mitigations() {
        let fx = Fixture::new();
        let job = fx.job("Solo");
        let a = fx.task(&job, "Only task");
        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = RiskPropagationService::new(&fx.conn, &sink);
        let result = service.propagate_delay(&a.id, 500.0).unwrap();
        assert!(result.affected_tasks.is_empty());
        assert!(result.mitigations.is_empty());
        assert_eq!(result.total_impact_minutes, 0.0);
    }

    #[test]
    fn delay_input_is_validated() {
        let fx = Fixture::new();
        let job = fx.job("Solo");
        let a = fx.task(&job, "Only task");
        let sink = TaskEventService::new(&fx.conn);
        let service = RiskPropagationService::new(&fx.conn, &sink);
        assert_eq!(
            service.propagate_delay(&a.id, -5.0).unwrap_err().code,
            ErrorCode::ValidationError
        );
        assert_eq!(
            service.propagate_delay("missing", 5.0).unwrap_err().code,
            ErrorCode::TaskNotFound
        );
    }

    #[test]
    fn failed_event_still_returns_result() {
        let fx = Fixture::new();
        let job = fx.job("Terrace");
        let a = fx.task(&job, "Grade");
        let b = fx.task(&job, "Pave");
        weighted(&fx, &a, &b, 2.0, false);

        let service = RiskPropagationService::new(&fx.conn, &FailingSink).with_now(fx.now);
        let result = service.propagate_delay(&a.id, 40.0).unwrap();
        assert!(result.notification.is_failed());
        assert_eq!(result.affected_tasks[0].new_risk_level, RiskLevel::High);
    }

    #[test]
    fn failure_violates_hard_edges_only() {
        let fx = Fixture::new();
        let job = fx.job("Roof");
        let strip = fx.task(&job, "Strip");
        let felt = fx.task(&job, "Felt");
        let gutters = fx.task(&job, "Gutters");
        let skip = fx.task(&job, "Skip hire");
        fx.dep(&strip, &felt);
        fx.dep(&felt, &gutters);
        let mut soft = NewDependency::finish_to_start(&strip.id, &skip.id);
        soft.is_hard = false;
        fx.dep_with(soft);
        fx.set_status(&gutters, TaskStatus::InProgress);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = RiskPropagationService::new(&fx.conn, &sink).with_now(fx.now);
        let result = service.propagate_failure(&strip.id).unwrap();

        assert_eq!(result.violated_dependencies.len(), 2);
        assert_eq!(result.blocked_tasks.len(), 1);
        assert_eq!(result.blocked_tasks[0].task_id, felt.id);
        assert_eq!(result.recovery_options.len(), 4);

        for dep_id in &result.violated_dependencies {
            let dep = dependency_repo::get_dependency(&fx.conn, dep_id).unwrap();
            assert_eq!(dep.status, DependencyStatus::Violated);
            assert_eq!(dep.current_risk_level, RiskLevel::Critical);
            assert_eq!(dep.violated_at, Some(fx.now));
        }
    }

    #[test]
    fn clean_job_has_zero_risk() {
        let fx = Fixture::new();
        let job = fx.job("Lawn");
        let mut later = fx.new_task(&job, "Mow");
        later.planned_start = Some(fx.hours(24));
        later.planned_end = Some(fx.hours(26));
        fx.insert(later);

        let sink = TaskEventService::new(&fx.conn);
        let service = RiskPropagationService::new(&fx.conn, &sink).with_now(fx.now);
        let risk = service.calculate_job_risk_score(&job.id).unwrap();
        assert_eq!(risk.risk_score, 0.0);
        assert_eq!(risk.risk_level, RiskLevel::Low);
    }

    #[test]
    fn risk_factors_are_capped() {
        let fx = Fixture::new();
        let job = fx.job("Patio");
        let root = fx.task(&job, "Root");
        for i in 0..4 {
            let t = fx.task(&job, &format!("Step {i}"));
            fx.dep(&root, &t);
            fx.set_status(&t, TaskStatus::Blocked);
        }
        let sink = TaskEventService::new(&fx.conn);
        let service = RiskPropagationService::new(&fx.conn, &sink).with_now(fx.now);
        service.propagate_failure(&root.id).unwrap();

        // every task was planned to end an hour from now; three hours later
        // all five are overdue
        let risk = RiskPropagationService::new(&fx.conn, &sink)
            .with_now(fx.hours(3))
            .calculate_job_risk_score(&job.id)
            .unwrap();
        assert_eq!(risk.factors.violated_dependencies, 4);
        assert_eq!(risk.factors.violated_points, 30.0);
        assert_eq!(risk.factors.blocked_points, 15.0);
        assert_eq!(risk.factors.overdue_tasks, 5);
        assert_eq!(risk.factors.overdue_points, 15.0);
        assert_eq!(risk.risk_score, 60.0);
        assert_eq!(risk.risk_level, RiskLevel::High);
    }

    #[test]
    fn unknown_job_is_not_found() {
        let fx = Fixture::new();
        let sink = TaskEventService::new(&fx.conn);
        let service = RiskPropagationService::new(&fx.conn, &sink);
        assert_eq!(
            service.calculate_job_risk_score("nope").unwrap_err().code,
            ErrorCode::JobNotFound
        );
    }
}
