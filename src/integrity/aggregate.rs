use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{employee_repo, job_repo, task_repo};
use crate::error::SiteopsError;
use crate::models::{Task, TaskStatus};

use super::IntegrityLevel;

const TOP_FLAGS: usize = 5;
/// Jobs averaging below this are listed in the system summary.
const JOB_ATTENTION_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelDistribution {
    pub excellent: usize,
    pub good: usize,
    pub warning: usize,
    pub critical: usize,
    pub failed: usize,
}

impl LevelDistribution {
    fn add(&mut self, level: IntegrityLevel) {
        let slot = match level {
            IntegrityLevel::Excellent => &mut self.excellent,
            IntegrityLevel::Good => &mut self.good,
            IntegrityLevel::Warning => &mut self.warning,
            IntegrityLevel::Critical => &mut self.critical,
            IntegrityLevel::Failed => &mut self.failed,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalTask {
    pub task_id: String,
    pub title: String,
    pub score: f64,
    pub level: IntegrityLevel,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagCount {
    pub flag: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegritySummary {
    pub task_count: usize,
    pub average_score: f64,
    pub min_score: Option<f64>,
    pub level: IntegrityLevel,
    pub distribution: LevelDistribution,
    pub critical_tasks: Vec<CriticalTask>,
    pub common_flags: Vec<FlagCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobIntegrity {
    pub job_id: String,
    pub title: String,
    pub average_score: f64,
    pub level: IntegrityLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemIntegritySummary {
    #[serde(flatten)]
    pub overall: IntegritySummary,
    pub jobs_below_threshold: Vec<JobIntegrity>,
}

/// Roll a set of tasks up into one summary. Cancelled tasks are ignored; an
/// empty set reads as a clean 100.
pub fn summarize(tasks: &[Task]) -> IntegritySummary {
    let scored: Vec<&Task> = tasks.iter().filter(|t| t.status != TaskStatus::Cancelled).collect();

    let average_score = if scored.is_empty() {
        100.0
    } else {
        let total: f64 = scored.iter().map(|t| t.integrity_score).sum();
        ((total / scored.len() as f64) * 100.0).round() / 100.0
    };
    let min_score = scored.iter().map(|t| t.integrity_score).reduce(f64::min);

    let mut distribution = LevelDistribution::default();
    let mut critical_tasks = Vec::new();
    let mut flag_counts: HashMap<&str, usize> = HashMap::new();
    for task in &scored {
        let level = IntegrityLevel::from_score(task.integrity_score);
        distribution.add(level);
        if level.is_critical_or_worse() {
            critical_tasks.push(CriticalTask {
                task_id: task.id.clone(),
                title: task.title.clone(),
                score: task.integrity_score,
                level,
                flags: task.integrity_flags.clone(),
            });
        }
        for flag in &task.integrity_flags {
            // material_deviation:Mulch and material_deviation:Sand are one kind
            let kind = flag.split(':').next().unwrap_or(flag);
            *flag_counts.entry(kind).or_default() += 1;
        }
    }
    critical_tasks.sort_by(|a, b| a.score.total_cmp(&b.score));

    let mut common_flags: Vec<FlagCount> = flag_counts
        .into_iter()
        .map(|(flag, count)| FlagCount {
            flag: flag.to_string(),
            count,
        })
        .collect();
    common_flags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.flag.cmp(&b.flag)));
    common_flags.truncate(TOP_FLAGS);

    IntegritySummary {
        task_count: scored.len(),
        average_score,
        min_score,
        level: IntegrityLevel::from_score(average_score),
        distribution,
        critical_tasks,
        common_flags,
    }
}

/// Reads persisted task scores; never recomputes them.
pub struct AggregatedIntegrityService<'a> {
    conn: &'a Connection,
}

impl<'a> AggregatedIntegrityService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn job_summary(&self, job_id: &str) -> Result<IntegritySummary, SiteopsError> {
        job_repo::get_job_by_id(self.conn, job_id)?;
        let tasks = task_repo::list_tasks_by_job(self.conn, job_id)?;
        Ok(summarize(&tasks))
    }

    pub fn employee_summary(&self, employee_id: &str) -> Result<IntegritySummary, SiteopsError> {
        employee_repo::get_employee_by_id(self.conn, employee_id)?;
        let tasks = task_repo::list_tasks_by_employee(self.conn, employee_id)?;
        Ok(summarize(&tasks))
    }

    pub fn system_summary(&self) -> Result<SystemIntegritySummary, SiteopsError> {
        let tasks = task_repo::list_all_tasks(self.conn)?;
        let overall = summarize(&tasks);

        let mut by_job: HashMap<&str, Vec<Task>> = HashMap::new();
        for task in &tasks {
            by_job.entry(task.job_id.as_str()).or_default().push(task.clone());
        }

        let mut jobs_below_threshold = Vec::new();
        for job in job_repo::list_jobs(self.conn)? {
            let Some(job_tasks) = by_job.get(job.id.as_str()) else {
                continue;
            };
            let summary = summarize(job_tasks);
            if summary.task_count > 0 && summary.average_score < JOB_ATTENTION_THRESHOLD {
                jobs_below_threshold.push(JobIntegrity {
                    job_id: job.id,
                    title: job.title,
                    average_score: summary.average_score,
                    level: summary.level,
                });
            }
        }
        jobs_below_threshold.sort_by(|a, b| a.average_score.total_cmp(&b.average_score));

        tracing::debug!(
            tasks = overall.task_count,
            average = overall.average_score,
            jobs_flagged = jobs_below_threshold.len(),
            "system integrity summarized"
        );
        Ok(SystemIntegritySummary {
            overall,
            jobs_below_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::events::TaskEventService;
    use crate::integrity::TaskIntegrityService;
    use crate::testing::Fixture;

    fn rescore(fx: &Fixture, task: &Task) {
        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        TaskIntegrityService::new(&fx.conn, &sink)
            .with_now(fx.now)
            .recalculate_and_update(&task.id, false)
            .unwrap();
    }

    #[test]
    fn empty_set_is_clean() {
        let summary = summarize(&[]);
        assert_eq!(summary.task_count, 0);
        assert_eq!(summary.average_score, 100.0);
        assert_eq!(summary.min_score, None);
        assert_eq!(summary.level, IntegrityLevel::Excellent);
    }

    #[test]
    fn job_summary_averages_and_groups_flags() {
        let fx = Fixture::new();
        let job = fx.job("Driveway");

        let done = fx.task(&job, "Pour base");
        let done = fx.complete_on_plan(&done);
        fx.material(&done, "Gravel", 100.0, 150.0);
        rescore(&fx, &done);

        let other = fx.task(&job, "Edge beds");
        let other = fx.complete_on_plan(&other);
        fx.material(&other, "Sand", 10.0, 20.0);
        rescore(&fx, &other);

        let cancelled = fx.task(&job, "Old idea");
        fx.set_status(&cancelled, TaskStatus::Cancelled);

        let summary = AggregatedIntegrityService::new(&fx.conn).job_summary(&job.id).unwrap();
        assert_eq!(summary.task_count, 2);
        // evidence 0 (-15), material -5 (-0.75), process -15 (-1.5)
        assert_eq!(summary.average_score, 82.75);
        assert_eq!(summary.min_score, Some(82.75));
        assert_eq!(summary.level, IntegrityLevel::Good);
        assert_eq!(summary.distribution.good, 2);
        assert!(summary.critical_tasks.is_empty());

        let material = summary
            .common_flags
            .iter()
            .find(|f| f.flag == "material_deviation")
            .unwrap();
        assert_eq!(material.count, 2);
        assert_eq!(summary.common_flags[0].count, 2);
    }

    /// Completed task missing most fields, with reversed actual times and
    /// heavy material overuse: scores 47.5.
    fn wreck(fx: &Fixture, job: &crate::models::Job) -> Task {
        let mut bare = fx.new_task(job, "");
        bare.assigned_employee_id = None;
        bare.planned_start = None;
        bare.planned_end = None;
        bare.expected_outcome = None;
        bare.location_type = None;
        bare.description = None;
        bare.gps = None;
        bare.location_name = None;
        let bare = fx.insert(bare);
        task_repo::set_actual_times(&fx.conn, &bare.id, Some(fx.now), Some(fx.hours(-1))).unwrap();
        for i in 0..20 {
            fx.material(&bare, &format!("Stone {i}"), 1.0, 50.0);
        }
        let bare = fx.set_status(&bare, TaskStatus::Completed);
        rescore(fx, &bare);
        fx.reload(&bare)
    }

    #[test]
    fn critical_tasks_are_listed() {
        let fx = Fixture::new();
        let job = fx.job("Retaining wall");
        let bad = wreck(&fx, &job);
        assert_eq!(bad.integrity_score, 47.5);
        fx.task(&job, "Fine work");

        let summary = AggregatedIntegrityService::new(&fx.conn).job_summary(&job.id).unwrap();
        assert_eq!(summary.critical_tasks.len(), 1);
        assert_eq!(summary.critical_tasks[0].task_id, bad.id);
        assert_eq!(summary.critical_tasks[0].level, IntegrityLevel::Critical);
        assert_eq!(summary.distribution.critical, 1);
        assert_eq!(summary.distribution.excellent, 1);
        assert_eq!(summary.min_score, Some(47.5));
        assert_eq!(summary.common_flags[0].flag, "material_deviation");
        assert_eq!(summary.common_flags[0].count, 20);
        assert_eq!(summary.common_flags.len(), TOP_FLAGS);
    }

    #[test]
    fn system_summary_flags_weak_jobs() {
        let fx = Fixture::new();
        let good = fx.job("Good job");
        fx.task(&good, "Fine work");

        let weak = fx.job("Weak job");
        wreck(&fx, &weak);

        let summary = AggregatedIntegrityService::new(&fx.conn).system_summary().unwrap();
        assert_eq!(summary.overall.task_count, 2);
        assert_eq!(summary.jobs_below_threshold.len(), 1);
        assert_eq!(summary.jobs_below_threshold[0].job_id, weak.id);
        assert_eq!(summary.jobs_below_threshold[0].level, IntegrityLevel::Critical);
    }

    #[test]
    fn unknown_subjects_are_not_found() {
        let fx = Fixture::new();
        let service = AggregatedIntegrityService::new(&fx.conn);
        assert_eq!(service.job_summary("nope").unwrap_err().code, ErrorCode::JobNotFound);
        assert_eq!(
            service.employee_summary("nope").unwrap_err().code,
            ErrorCode::EmployeeNotFound
        );
    }
}
