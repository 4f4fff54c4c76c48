use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::db::{alert_repo, task_repo};
use crate::error::SiteopsError;
use crate::integrity::{AggregatedIntegrityService, IntegrityLevel};
use crate::models::{Severity, StoredBriefing, Task, TaskStatus};

use super::{sort_attention, AttentionItem, Bottleneck, OperatorTaskInterface, Scope};

/// Overdue carry-overs older than this many days are critical.
const LONG_OVERDUE_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct TaskBrief {
    pub task_id: String,
    pub job_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub assigned_employee_id: Option<String>,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
}

impl From<&Task> for TaskBrief {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            job_id: task.job_id.clone(),
            title: task.title.clone(),
            status: task.status,
            assigned_employee_id: task.assigned_employee_id.clone(),
            planned_start: task.planned_start,
            planned_end: task.planned_end,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverdueTask {
    #[serde(flatten)]
    pub task: TaskBrief,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBriefing {
    pub date: NaiveDate,
    pub generated_at: NaiveDateTime,
    pub scheduled_tasks: Vec<TaskBrief>,
    pub overdue_tasks: Vec<OverdueTask>,
    pub integrity_average: f64,
    pub integrity_level: IntegrityLevel,
    pub critical_bottlenecks: Vec<Bottleneck>,
    pub executive_summary: String,
    pub attention_items: Vec<AttentionItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedBriefing {
    /// False when a snapshot for the date already existed.
    pub created: bool,
    pub briefing: StoredBriefing,
}

fn executive_summary(
    date: NaiveDate,
    scheduled: usize,
    overdue: usize,
    average: f64,
    level: IntegrityLevel,
    critical: usize,
) -> String {
    let mut sentences = vec![format!("{scheduled} tasks are scheduled for {date}.")];
    if overdue > 0 {
        sentences.push(format!("{overdue} overdue tasks carry over from earlier days."));
    }
    sentences.push(format!("System integrity averages {average:.1} ({}).", level.as_str()));
    if critical > 0 {
        sentences.push(format!("{critical} critical bottlenecks need attention."));
    } else {
        sentences.push("No critical bottlenecks detected.".to_string());
    }
    sentences.join(" ")
}

impl OperatorTaskInterface<'_> {
    pub fn generate_daily_briefing(&self, date: NaiveDate) -> Result<DailyBriefing, SiteopsError> {
        let day_start = date.and_time(NaiveTime::MIN);
        let tasks = task_repo::list_all_tasks(self.conn)?;

        let scheduled_tasks: Vec<TaskBrief> = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Cancelled)
            .filter(|t| t.planned_start.is_some_and(|s| s.date() == date))
            .map(TaskBrief::from)
            .collect();

        let mut overdue_tasks: Vec<OverdueTask> = tasks
            .iter()
            .filter(|t| t.is_overdue(day_start))
            .filter_map(|t| {
                let end = t.planned_end?;
                Some(OverdueTask {
                    task: TaskBrief::from(t),
                    days_overdue: (day_start - end).num_days(),
                })
            })
            .collect();
        overdue_tasks.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));

        let system = AggregatedIntegrityService::new(self.conn).system_summary()?;
        let critical_bottlenecks: Vec<Bottleneck> = self
            .detect_bottlenecks(&Scope::System)?
            .into_iter()
            .filter(|b| b.severity == Severity::Critical)
            .collect();

        let mut attention_items: Vec<AttentionItem> = overdue_tasks
            .iter()
            .map(|o| AttentionItem {
                priority: if o.days_overdue > LONG_OVERDUE_DAYS {
                    Severity::Critical
                } else {
                    Severity::High
                },
                category: "overdue",
                message: format!("'{}' is {} days overdue", o.task.title, o.days_overdue),
                task_id: Some(o.task.task_id.clone()),
            })
            .collect();
        attention_items.extend(critical_bottlenecks.iter().map(|b| AttentionItem {
            priority: Severity::Critical,
            category: "bottleneck",
            message: b.message.clone(),
            task_id: b.job_id.is_some().then(|| b.subject_id.clone()),
        }));
        sort_attention(&mut attention_items);

        let executive_summary = executive_summary(
            date,
            scheduled_tasks.len(),
            overdue_tasks.len(),
            system.overall.average_score,
            system.overall.level,
            critical_bottlenecks.len(),
        );

        Ok(DailyBriefing {
            date,
            generated_at: self.now,
            scheduled_tasks,
            overdue_tasks,
            integrity_average: system.overall.average_score,
            integrity_level: system.overall.level,
            critical_bottlenecks,
            executive_summary,
            attention_items,
        })
    }

    /// Store the briefing for a date once. Later calls return the snapshot
    /// that was stored first.
    pub fn publish_daily_briefing(&self, date: NaiveDate) -> Result<PublishedBriefing, SiteopsError> {
        if let Some(existing) = alert_repo::get_briefing(self.conn, date)? {
            return Ok(PublishedBriefing {
                created: false,
                briefing: existing,
            });
        }
        let briefing = self.generate_daily_briefing(date)?;
        let payload = serde_json::to_value(&briefing)?;
        let created = alert_repo::insert_briefing(self.conn, date, &payload, self.now)?;
        let stored = alert_repo::get_briefing(self.conn, date)?
            .ok_or_else(|| SiteopsError::database(format!("briefing for {date} was not stored")))?;
        if created {
            tracing::info!(date = %date, "daily briefing published");
        }
        Ok(PublishedBriefing {
            created,
            briefing: stored,
        })
    }
}
