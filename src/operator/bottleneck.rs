use std::collections::BTreeSet;

use serde::Serialize;

use crate::db::alert_repo::{self, NewAlert};
use crate::db::{employee_repo, event_repo, job_repo, task_repo};
use crate::error::SiteopsError;
use crate::graph::DependencyGraphService;
use crate::models::{AiAlert, Severity, Task, TaskEventType, TaskStatus};

use super::{OperatorTaskInterface, Scope};

const OVERLOAD_MEDIUM: usize = 5;
const OVERLOAD_HIGH: usize = 7;
const BLOCKING_HIGH: usize = 3;
const BLOCKING_CRITICAL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    EmployeeOverload,
    BlockingTask,
    MaterialShortage,
}

impl BottleneckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmployeeOverload => "employee_overload",
            Self::BlockingTask => "blocking_task",
            Self::MaterialShortage => "material_shortage",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub severity: Severity,
    /// Employee id for overloads, task id otherwise.
    pub subject_id: String,
    pub subject_name: String,
    pub job_id: Option<String>,
    /// Active tasks, downstream dependents, or shortage events.
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub period: String,
    pub detected: usize,
    pub new_alerts: Vec<AiAlert>,
}

fn mentions_material(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| r.to_lowercase().contains("material"))
}

impl OperatorTaskInterface<'_> {
    fn tasks_in_scope(&self, scope: &Scope) -> Result<Vec<Task>, SiteopsError> {
        match scope {
            Scope::System => task_repo::list_all_tasks(self.conn),
            Scope::Job(job_id) => {
                job_repo::get_job_by_id(self.conn, job_id)?;
                task_repo::list_tasks_by_job(self.conn, job_id)
            }
        }
    }

    /// Three independent rule scans, most severe first.
    pub fn detect_bottlenecks(&self, scope: &Scope) -> Result<Vec<Bottleneck>, SiteopsError> {
        let tasks = self.tasks_in_scope(scope)?;
        let mut found = self.employee_overloads(&tasks)?;
        found.extend(self.blocking_tasks(&tasks)?);
        found.extend(self.material_shortages(&tasks)?);
        // stable: ties keep scan order
        found.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(found)
    }

    fn employee_overloads(&self, scoped: &[Task]) -> Result<Vec<Bottleneck>, SiteopsError> {
        // Load counts across all jobs: a person is overloaded regardless of scope.
        let employees: BTreeSet<&str> = scoped
            .iter()
            .filter(|t| t.status.is_active())
            .filter_map(|t| t.assigned_employee_id.as_deref())
            .collect();

        let mut out = Vec::new();
        for employee_id in employees {
            let active = task_repo::list_tasks_by_employee(self.conn, employee_id)?
                .iter()
                .filter(|t| t.status.is_active())
                .count();
            let severity = if active >= OVERLOAD_HIGH {
                Severity::High
            } else if active >= OVERLOAD_MEDIUM {
                Severity::Medium
            } else {
                continue;
            };
            let employee = employee_repo::get_employee_by_id(self.conn, employee_id)?;
            out.push(Bottleneck {
                kind: BottleneckKind::EmployeeOverload,
                severity,
                message: format!("{} has {active} active tasks", employee.name),
                subject_id: employee.id,
                subject_name: employee.name,
                job_id: None,
                count: active,
            });
        }
        Ok(out)
    }

    fn blocking_tasks(&self, scoped: &[Task]) -> Result<Vec<Bottleneck>, SiteopsError> {
        let graph = DependencyGraphService::new(self.conn).with_now(self.now);
        let mut out = Vec::new();
        for task in scoped.iter().filter(|t| !t.status.is_closed()) {
            let dependents = graph.get_downstream_tasks(&task.id, None)?.len();
            let severity = if dependents >= BLOCKING_CRITICAL {
                Severity::Critical
            } else if dependents >= BLOCKING_HIGH {
                Severity::High
            } else {
                continue;
            };
            out.push(Bottleneck {
                kind: BottleneckKind::BlockingTask,
                severity,
                subject_id: task.id.clone(),
                subject_name: task.title.clone(),
                job_id: Some(task.job_id.clone()),
                count: dependents,
                message: format!("'{}' holds up {dependents} downstream tasks", task.title),
            });
        }
        Ok(out)
    }

    fn material_shortages(&self, scoped: &[Task]) -> Result<Vec<Bottleneck>, SiteopsError> {
        let mut out = Vec::new();
        for task in scoped.iter().filter(|t| t.status == TaskStatus::Blocked) {
            let shortages = event_repo::list_for_task(self.conn, &task.id)?
                .iter()
                .filter(|e| match e.event_type {
                    TaskEventType::MaterialShortage => true,
                    TaskEventType::Blocked => mentions_material(e.payload.reason()),
                    _ => false,
                })
                .count();
            if shortages == 0 {
                continue;
            }
            out.push(Bottleneck {
                kind: BottleneckKind::MaterialShortage,
                severity: Severity::High,
                subject_id: task.id.clone(),
                subject_name: task.title.clone(),
                job_id: Some(task.job_id.clone()),
                count: shortages,
                message: format!("'{}' is blocked waiting for material", task.title),
            });
        }
        Ok(out)
    }

    /// Persist the current bottlenecks as alerts, at most once per subject
    /// and kind in each clock hour. Returns only the alerts written now.
    pub fn run_bottleneck_scan(&self, scope: &Scope) -> Result<ScanOutcome, SiteopsError> {
        let bottlenecks = self.detect_bottlenecks(scope)?;
        let period = self.now.format("%Y-%m-%dT%H").to_string();

        let mut new_alerts = Vec::new();
        for b in &bottlenecks {
            let title = format!("{}: {}", b.kind.as_str().replace('_', " "), b.subject_name);
            let alert = NewAlert {
                alert_type: b.kind.as_str(),
                severity: b.severity,
                job_id: b.job_id.as_deref(),
                subject_id: &b.subject_id,
                title: &title,
                message: &b.message,
                period: &period,
            };
            if let Some(stored) = alert_repo::insert_alert_once(self.conn, &alert, self.now)? {
                new_alerts.push(stored);
            }
        }

        tracing::info!(
            period = %period,
            detected = bottlenecks.len(),
            written = new_alerts.len(),
            "bottleneck scan finished"
        );
        Ok(ScanOutcome {
            period,
            detected: bottlenecks.len(),
            new_alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::error::ErrorCode;
    use crate::testing::Fixture;

    fn operator(fx: &Fixture) -> OperatorTaskInterface<'_> {
        OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default()).with_now(fx.now)
    }

    #[test]
    fn overload_thresholds() {
        let fx = Fixture::new();
        let job = fx.job("Estate");
        for i in 0..5 {
            let t = fx.task(&job, &format!("Bed {i}"));
            fx.set_status(&t, TaskStatus::InProgress);
        }
        let found = operator(&fx).detect_bottlenecks(&Scope::System).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, BottleneckKind::EmployeeOverload);
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].subject_id, fx.crew.id);

        for i in 0..2 {
            let t = fx.task(&job, &format!("Hedge {i}"));
            fx.set_status(&t, TaskStatus::Assigned);
        }
        let found = operator(&fx).detect_bottlenecks(&Scope::System).unwrap();
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].count, 7);
    }

    #[test]
    fn blocking_tasks_sorted_by_severity() {
        let fx = Fixture::new();
        let job = fx.job("Courtyard");
        let big = fx.task(&job, "Drainage");
        let medium = fx.task(&job, "Walls");
        for i in 0..5 {
            let t = fx.task(&job, &format!("After drainage {i}"));
            fx.dep(&big, &t);
        }
        for i in 0..3 {
            let t = fx.task(&job, &format!("After walls {i}"));
            fx.dep(&medium, &t);
        }
        let found = operator(&fx)
            .detect_bottlenecks(&Scope::Job(job.id.clone()))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[0].subject_id, big.id);
        assert_eq!(found[1].severity, Severity::High);
        assert_eq!(found[1].subject_id, medium.id);
    }

    #[test]
    fn completed_tasks_are_not_blocking() {
        let fx = Fixture::new();
        let job = fx.job("Courtyard");
        let done = fx.task(&job, "Drainage");
        for i in 0..5 {
            let t = fx.task(&job, &format!("After {i}"));
            fx.dep(&done, &t);
        }
        fx.set_status(&done, TaskStatus::Completed);
        assert!(operator(&fx).detect_bottlenecks(&Scope::System).unwrap().is_empty());
    }

    #[test]
    fn material_blocks_are_found_by_event_or_reason() {
        let fx = Fixture::new();
        let job = fx.job("Greenhouse");
        let glass = fx.task(&job, "Glazing");
        fx.set_status(&glass, TaskStatus::Blocked);
        fx.deviation(&glass, TaskEventType::Blocked, "Waiting for Material delivery");

        let frame = fx.task(&job, "Frame");
        fx.set_status(&frame, TaskStatus::Blocked);
        fx.deviation(&frame, TaskEventType::Blocked, "Client away");

        let soil = fx.task(&job, "Soil");
        fx.set_status(&soil, TaskStatus::Blocked);
        fx.deviation(&soil, TaskEventType::MaterialShortage, "Out of compost");

        let found = operator(&fx).detect_bottlenecks(&Scope::System).unwrap();
        let mut subjects: Vec<&str> = found.iter().map(|b| b.subject_id.as_str()).collect();
        subjects.sort();
        let mut expected = vec![glass.id.as_str(), soil.id.as_str()];
        expected.sort();
        assert_eq!(subjects, expected);
        assert!(found.iter().all(|b| b.severity == Severity::High));
    }

    #[test]
    fn scan_writes_each_alert_once_per_hour() {
        let fx = Fixture::new();
        let job = fx.job("Courtyard");
        let big = fx.task(&job, "Drainage");
        for i in 0..3 {
            let t = fx.task(&job, &format!("After {i}"));
            fx.dep(&big, &t);
        }

        let first = operator(&fx).run_bottleneck_scan(&Scope::System).unwrap();
        assert_eq!(first.period, "2026-06-15T12");
        assert_eq!(first.new_alerts.len(), 1);
        assert_eq!(first.new_alerts[0].alert_type, "blocking_task");

        let again = operator(&fx).run_bottleneck_scan(&Scope::System).unwrap();
        assert_eq!(again.detected, 1);
        assert!(again.new_alerts.is_empty());

        let next_hour = OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default())
            .with_now(fx.hours(1))
            .run_bottleneck_scan(&Scope::System)
            .unwrap();
        assert_eq!(next_hour.new_alerts.len(), 1);
        assert_eq!(alert_repo::list_alerts(&fx.conn, 10).unwrap().len(), 2);
    }

    #[test]
    fn unknown_job_scope_is_not_found() {
        let fx = Fixture::new();
        let err = operator(&fx)
            .detect_bottlenecks(&Scope::Job("nope".into()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::JobNotFound);
    }
}
