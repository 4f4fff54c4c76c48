use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::db::task_repo::{self, StatusCounts};
use crate::db::{employee_repo, event_repo, job_repo};
use crate::error::SiteopsError;
use crate::events::TaskEventService;
use crate::graph::{BlockingDependency, DependencyGraphService};
use crate::integrity::{AggregatedIntegrityService, IntegritySummary};
use crate::models::{Employee, Job, Severity, Task, TaskEvent, TaskEventType, TaskStatus};
use crate::risk::{JobRisk, RiskPropagationService};

use super::{sort_attention, AttentionItem, DeviationPattern, OperatorTaskInterface, Scope};

const LOAD_HIGH: usize = 7;
const LOAD_MEDIUM: usize = 5;
const PERFORMANCE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct BlockedTaskReport {
    pub task_id: String,
    pub title: String,
    pub blocking_dependencies: Vec<BlockingDependency>,
    /// Reason on the latest blocked or material-shortage event.
    pub block_reason: Option<String>,
    pub downstream_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LateTask {
    pub task_id: String,
    pub title: String,
    pub planned_end: NaiveDateTime,
    pub minutes_late: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalPathStatus {
    /// Topological order, absent while the dependencies contain a cycle.
    pub order: Option<Vec<String>>,
    pub cycles: Vec<Vec<String>>,
    pub late_in_progress: Vec<LateTask>,
    pub deadline_at_risk: bool,
}

/// Two open tasks of one employee whose planned windows overlap.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceTension {
    pub employee_id: String,
    pub first_task_id: String,
    pub second_task_id: String,
    pub overlap_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSituationReport {
    pub job: Job,
    pub generated_at: NaiveDateTime,
    pub status_counts: StatusCounts,
    pub integrity: IntegritySummary,
    pub risk: JobRisk,
    pub blocked_tasks: Vec<BlockedTaskReport>,
    pub critical_path: CriticalPathStatus,
    pub deviation_patterns: Vec<DeviationPattern>,
    pub resource_tensions: Vec<ResourceTension>,
    pub recent_events: Vec<TaskEvent>,
    pub attention_required: Vec<AttentionItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeePerformanceContext {
    pub employee: Employee,
    pub active_tasks: usize,
    pub load: Severity,
    pub completed_last_30_days: usize,
    /// Share of those completions that ended by their planned end.
    pub on_time_rate: Option<f64>,
    pub integrity: IntegritySummary,
    pub recent_events: Vec<TaskEvent>,
}

fn is_open(task: &Task) -> bool {
    !task.status.is_finished() && task.status != TaskStatus::Cancelled
}

/// Overlapping planned windows between open tasks of the same employee,
/// keeping only pairs that touch `job_id`.
pub fn find_resource_tensions(tasks: &[Task], job_id: &str) -> Vec<ResourceTension> {
    let mut windowed: Vec<(&str, NaiveDateTime, NaiveDateTime, &Task)> = tasks
        .iter()
        .filter(|t| is_open(t))
        .filter_map(|t| {
            let employee = t.assigned_employee_id.as_deref()?;
            Some((employee, t.planned_start?, t.planned_end?, t))
        })
        .collect();
    windowed.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)).then(a.3.id.cmp(&b.3.id)));

    let mut tensions = Vec::new();
    for (i, (employee, start_a, end_a, a)) in windowed.iter().enumerate() {
        for (other, start_b, end_b, b) in &windowed[i + 1..] {
            if other != employee {
                break;
            }
            if a.job_id != job_id && b.job_id != job_id {
                continue;
            }
            let overlap_start = (*start_a).max(*start_b);
            let overlap_end = (*end_a).min(*end_b);
            if overlap_start < overlap_end {
                tensions.push(ResourceTension {
                    employee_id: employee.to_string(),
                    first_task_id: a.id.clone(),
                    second_task_id: b.id.clone(),
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }
    tensions
}

/// Events come oldest first.
fn latest_block_reason(events: &[TaskEvent]) -> Option<String> {
    events
        .iter()
        .rev()
        .filter(|e| matches!(e.event_type, TaskEventType::Blocked | TaskEventType::MaterialShortage))
        .find_map(|e| e.payload.reason().map(str::trim).filter(|r| !r.is_empty()))
        .map(str::to_string)
}

impl OperatorTaskInterface<'_> {
    pub fn get_job_situation_report(&self, job_id: &str) -> Result<JobSituationReport, SiteopsError> {
        let job = job_repo::get_job_by_id(self.conn, job_id)?;
        let tasks = task_repo::list_tasks_by_job(self.conn, &job.id)?;
        let graph = DependencyGraphService::new(self.conn).with_now(self.now);

        let status_counts = task_repo::status_counts(self.conn, &job.id)?;
        let integrity = AggregatedIntegrityService::new(self.conn).job_summary(&job.id)?;
        let sink = TaskEventService::new(self.conn).with_now(self.now);
        let risk = RiskPropagationService::new(self.conn, &sink)
            .with_now(self.now)
            .calculate_job_risk_score(&job.id)?;

        let mut blocked_tasks = Vec::new();
        for task in tasks.iter().filter(|t| t.status == TaskStatus::Blocked) {
            blocked_tasks.push(BlockedTaskReport {
                task_id: task.id.clone(),
                title: task.title.clone(),
                blocking_dependencies: graph.check_can_start(&task.id)?.blocking_dependencies,
                block_reason: latest_block_reason(&event_repo::list_for_task(self.conn, &task.id)?),
                downstream_count: graph.get_downstream_tasks(&task.id, None)?.len(),
            });
        }

        let late_in_progress: Vec<LateTask> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .filter_map(|t| {
                let planned_end = t.planned_end?;
                (planned_end < self.now).then(|| LateTask {
                    task_id: t.id.clone(),
                    title: t.title.clone(),
                    planned_end,
                    minutes_late: (self.now - planned_end).num_minutes(),
                })
            })
            .collect();
        let critical_path = CriticalPathStatus {
            order: graph.topological_sort(&job.id)?,
            cycles: graph.detect_cycles(&job.id)?,
            deadline_at_risk: !late_in_progress.is_empty(),
            late_in_progress,
        };

        let deviation_patterns = self.preview_deviation_patterns(
            &Scope::Job(job.id.clone()),
            self.config.situation_pattern_min_occurrences,
        )?;
        let resource_tensions = find_resource_tensions(&task_repo::list_all_tasks(self.conn)?, &job.id);
        let recent_events = event_repo::list_for_job(self.conn, &job.id, self.config.recent_event_limit)?;

        let mut attention_required = Vec::new();
        if !integrity.critical_tasks.is_empty() {
            attention_required.push(AttentionItem {
                priority: Severity::High,
                category: "integrity",
                message: format!(
                    "{} tasks have critical integrity scores",
                    integrity.critical_tasks.len()
                ),
                task_id: None,
            });
        }
        for blocked in &blocked_tasks {
            let message = match (blocked.blocking_dependencies.len(), &blocked.block_reason) {
                (0, Some(reason)) => format!("'{}' is blocked: {reason}", blocked.title),
                (0, None) => format!("'{}' is blocked", blocked.title),
                (n, _) => format!("'{}' is waiting on {n} unfinished predecessors", blocked.title),
            };
            attention_required.push(AttentionItem {
                priority: Severity::High,
                category: "blocked",
                message,
                task_id: Some(blocked.task_id.clone()),
            });
        }
        for late in &critical_path.late_in_progress {
            attention_required.push(AttentionItem {
                priority: Severity::Critical,
                category: "deadline",
                message: format!("'{}' is {} minutes past its planned end", late.title, late.minutes_late),
                task_id: Some(late.task_id.clone()),
            });
        }
        sort_attention(&mut attention_required);

        tracing::debug!(
            job_id = %job.id,
            blocked = blocked_tasks.len(),
            attention = attention_required.len(),
            "situation report built"
        );
        Ok(JobSituationReport {
            job,
            generated_at: self.now,
            status_counts,
            integrity,
            risk,
            blocked_tasks,
            critical_path,
            deviation_patterns,
            resource_tensions,
            recent_events,
            attention_required,
        })
    }

    pub fn get_employee_performance_context(
        &self,
        employee_id: &str,
    ) -> Result<EmployeePerformanceContext, SiteopsError> {
        let employee = employee_repo::get_employee_by_id(self.conn, employee_id)?;
        let tasks = task_repo::list_tasks_by_employee(self.conn, &employee.id)?;

        let active_tasks = tasks.iter().filter(|t| t.status.is_active()).count();
        let load = if active_tasks >= LOAD_HIGH {
            Severity::High
        } else if active_tasks >= LOAD_MEDIUM {
            Severity::Medium
        } else {
            Severity::Low
        };

        let since = self.now - Duration::days(PERFORMANCE_WINDOW_DAYS);
        let recent: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && t.actual_end.is_some_and(|end| end >= since))
            .collect();
        let judged: Vec<bool> = recent
            .iter()
            .filter_map(|t| Some(t.actual_end? <= t.planned_end?))
            .collect();
        let on_time_rate = (!judged.is_empty()).then(|| {
            let on_time = judged.iter().filter(|&&ok| ok).count() as f64;
            (on_time / judged.len() as f64 * 100.0).round() / 100.0
        });

        let integrity = AggregatedIntegrityService::new(self.conn).employee_summary(&employee.id)?;
        let recent_events = event_repo::list_for_employee(self.conn, &employee.id, self.config.recent_event_limit)?;

        Ok(EmployeePerformanceContext {
            employee,
            active_tasks,
            load,
            completed_last_30_days: recent.len(),
            on_time_rate,
            integrity,
            recent_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::db::task_repo;
    use crate::error::ErrorCode;
    use crate::models::{EventPayload, TaskEventType};
    use crate::testing::Fixture;

    fn operator(fx: &Fixture) -> OperatorTaskInterface<'_> {
        OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default()).with_now(fx.now)
    }

    #[test]
    fn report_on_quiet_job() {
        let fx = Fixture::new();
        let job = fx.job("Lawn");
        let mut later = fx.new_task(&job, "Mow");
        later.planned_start = Some(fx.hours(24));
        later.planned_end = Some(fx.hours(26));
        let task = fx.insert(later);

        let report = operator(&fx).get_job_situation_report(&job.id).unwrap();
        assert_eq!(report.status_counts.total, 1);
        assert_eq!(report.integrity.average_score, 100.0);
        assert_eq!(report.risk.risk_score, 0.0);
        assert!(report.blocked_tasks.is_empty());
        assert_eq!(report.critical_path.order, Some(vec![task.id]));
        assert!(!report.critical_path.deadline_at_risk);
        assert!(report.attention_required.is_empty());
    }

    #[test]
    fn report_ranks_attention_items() {
        let fx = Fixture::new();
        let job = fx.job("Patio");
        let base = fx.task(&job, "Sub-base");
        let slabs = fx.task(&job, "Slabs");
        fx.dep(&base, &slabs);
        fx.set_status(&slabs, TaskStatus::Blocked);
        fx.event_at(
            &slabs,
            TaskEventType::Blocked,
            EventPayload::Blocked {
                reason: "Sub-base not compacted".into(),
                blocking_task_id: Some(base.id.clone()),
            },
            fx.hours(-1),
        );
        // planned to end an hour ago
        let mut late = fx.new_task(&job, "Edging");
        late.planned_start = Some(fx.hours(-5));
        late.planned_end = Some(fx.hours(-1));
        let late = fx.insert(late);
        fx.set_status(&late, TaskStatus::InProgress);

        let report = operator(&fx).get_job_situation_report(&job.id).unwrap();
        assert_eq!(report.blocked_tasks.len(), 1);
        assert_eq!(report.blocked_tasks[0].blocking_dependencies.len(), 1);
        assert!(report.critical_path.deadline_at_risk);
        assert_eq!(report.critical_path.late_in_progress[0].minutes_late, 60);
        assert_eq!(report.recent_events.len(), 1);

        let priorities: Vec<Severity> = report.attention_required.iter().map(|a| a.priority).collect();
        assert_eq!(priorities, vec![Severity::Critical, Severity::High]);
        assert_eq!(report.attention_required[0].category, "deadline");
        assert_eq!(report.attention_required[1].task_id.as_deref(), Some(slabs.id.as_str()));
    }

    #[test]
    fn blocked_task_without_edges_needs_attention() {
        let fx = Fixture::new();
        let job = fx.job("Conservatory");
        let glazing = fx.task(&job, "Glazing");
        fx.set_status(&glazing, TaskStatus::Blocked);
        fx.deviation(&glazing, TaskEventType::MaterialShortage, "Glass panels not delivered");

        let report = operator(&fx).get_job_situation_report(&job.id).unwrap();
        assert_eq!(report.blocked_tasks.len(), 1);
        assert!(report.blocked_tasks[0].blocking_dependencies.is_empty());
        assert_eq!(
            report.blocked_tasks[0].block_reason.as_deref(),
            Some("Glass panels not delivered")
        );
        let blocked: Vec<&AttentionItem> = report
            .attention_required
            .iter()
            .filter(|a| a.category == "blocked")
            .collect();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].priority, Severity::High);
        assert_eq!(blocked[0].task_id.as_deref(), Some(glazing.id.as_str()));
        assert!(blocked[0].message.contains("Glass panels not delivered"));

        // building the report leaves events for pattern analysis
        let events = event_repo::list_for_task(&fx.conn, &glazing.id).unwrap();
        assert!(events.iter().all(|e| !e.ai_processed));
    }

    #[test]
    fn report_flags_cycles() {
        let fx = Fixture::new();
        let job = fx.job("Loop");
        let a = fx.task(&job, "A");
        let b = fx.task(&job, "B");
        fx.dep(&a, &b);
        fx.dep(&b, &a);
        let report = operator(&fx).get_job_situation_report(&job.id).unwrap();
        assert!(report.critical_path.order.is_none());
        assert_eq!(report.critical_path.cycles.len(), 1);
    }

    #[test]
    fn tensions_need_overlap_and_same_employee() {
        let fx = Fixture::new();
        let job = fx.job("Garden");
        let other = fx.job("Other garden");
        let a = fx.task(&job, "Prune");
        let b = fx.task(&other, "Weed");
        let mut apart = fx.new_task(&job, "Later");
        apart.planned_start = Some(fx.hours(5));
        apart.planned_end = Some(fx.hours(6));
        fx.insert(apart);
        let mut someone_else = fx.new_task(&job, "Other crew");
        someone_else.assigned_employee_id = Some(fx.employee("Sam").id);
        fx.insert(someone_else);

        let tasks = task_repo::list_all_tasks(&fx.conn).unwrap();
        let tensions = find_resource_tensions(&tasks, &job.id);
        assert_eq!(tensions.len(), 1);
        let pair = [tensions[0].first_task_id.as_str(), tensions[0].second_task_id.as_str()];
        assert!(pair.contains(&a.id.as_str()) && pair.contains(&b.id.as_str()));
        assert_eq!(tensions[0].overlap_minutes, 120);

        fx.set_status(&b, TaskStatus::Completed);
        let tasks = task_repo::list_all_tasks(&fx.conn).unwrap();
        assert!(find_resource_tensions(&tasks, &job.id).is_empty());
    }

    #[test]
    fn employee_context_summarises_load_and_punctuality() {
        let fx = Fixture::new();
        let job = fx.job("Hedges");
        let on_time = fx.task(&job, "Trim front");
        fx.complete_on_plan(&on_time);
        let overran = fx.task(&job, "Trim back");
        task_repo::set_actual_times(&fx.conn, &overran.id, Some(fx.hours(-1)), Some(fx.hours(3))).unwrap();
        fx.set_status(&overran, TaskStatus::Completed);
        for i in 0..5 {
            let t = fx.task(&job, &format!("Bed {i}"));
            fx.set_status(&t, TaskStatus::InProgress);
        }
        fx.event_at(&on_time, TaskEventType::Completed, EventPayload::Empty, fx.now);

        let context = operator(&fx).get_employee_performance_context(&fx.crew.id).unwrap();
        assert_eq!(context.active_tasks, 5);
        assert_eq!(context.load, Severity::Medium);
        assert_eq!(context.completed_last_30_days, 2);
        assert_eq!(context.on_time_rate, Some(0.5));
        assert_eq!(context.integrity.task_count, 7);
        assert_eq!(context.recent_events.len(), 1);

        let err = operator(&fx).get_employee_performance_context("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::EmployeeNotFound);
    }
}
