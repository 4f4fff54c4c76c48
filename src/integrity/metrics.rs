//! The seven weighted sub-metrics behind a task's integrity score.
//!
//! Every metric starts from 100 and subtracts for what is missing or
//! inconsistent, returning the flags that explain each deduction. Nothing
//! here fails: absent data lowers the relevant score instead.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{EvidenceType, Task, TaskEvidence, TaskMaterial, TaskStatus};

use super::IntegrityLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DataCompleteness,
    TimeAccuracy,
    EvidenceQuality,
    MaterialConsistency,
    ProcessCompliance,
    LocationValidity,
    DependencyIntegrity,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Self::DataCompleteness,
        Self::TimeAccuracy,
        Self::EvidenceQuality,
        Self::MaterialConsistency,
        Self::ProcessCompliance,
        Self::LocationValidity,
        Self::DependencyIntegrity,
    ];

    /// Weights sum to 1.0.
    pub fn weight(&self) -> f64 {
        match self {
            Self::DataCompleteness => 0.20,
            Self::TimeAccuracy => 0.20,
            Self::EvidenceQuality => 0.15,
            Self::MaterialConsistency => 0.15,
            Self::ProcessCompliance => 0.10,
            Self::LocationValidity => 0.10,
            Self::DependencyIntegrity => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataCompleteness => "data_completeness",
            Self::TimeAccuracy => "time_accuracy",
            Self::EvidenceQuality => "evidence_quality",
            Self::MaterialConsistency => "material_consistency",
            Self::ProcessCompliance => "process_compliance",
            Self::LocationValidity => "location_validity",
            Self::DependencyIntegrity => "dependency_integrity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricScore {
    pub metric: Metric,
    pub score: f64,
    pub weight: f64,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityResult {
    pub score: f64,
    pub level: IntegrityLevel,
    pub trust: f64,
    pub flags: Vec<String>,
    pub breakdown: Vec<MetricScore>,
}

impl IntegrityResult {
    pub fn metric(&self, metric: Metric) -> Option<&MetricScore> {
        self.breakdown.iter().find(|m| m.metric == metric)
    }
}

pub fn calculate_full_integrity(
    task: &Task,
    evidence: &[TaskEvidence],
    materials: &[TaskMaterial],
    now: NaiveDateTime,
) -> IntegrityResult {
    let breakdown: Vec<MetricScore> = Metric::ALL
        .iter()
        .map(|&metric| {
            let (score, flags) = match metric {
                Metric::DataCompleteness => data_completeness(task),
                Metric::TimeAccuracy => time_accuracy(task, now),
                Metric::EvidenceQuality => evidence_quality(task, evidence),
                Metric::MaterialConsistency => material_consistency(materials),
                Metric::ProcessCompliance => process_compliance(task, materials),
                Metric::LocationValidity => location_validity(task),
                Metric::DependencyIntegrity => dependency_integrity(task),
            };
            MetricScore {
                metric,
                score,
                weight: metric.weight(),
                flags,
            }
        })
        .collect();

    let weighted: f64 = breakdown.iter().map(|m| m.score * m.weight).sum();
    let score = ((weighted * 100.0).round() / 100.0).clamp(0.0, 100.0);
    let level = IntegrityLevel::from_score(score);
    let flags = breakdown.iter().flat_map(|m| m.flags.iter().cloned()).collect();

    IntegrityResult {
        score,
        level,
        trust: level.trust(),
        flags,
        breakdown,
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub fn data_completeness(task: &Task) -> (f64, Vec<String>) {
    let required = [
        ("title", task.title.trim().is_empty()),
        ("job", task.job_id.trim().is_empty()),
        ("assignee", is_blank(&task.assigned_employee_id)),
        ("planned_start", task.planned_start.is_none()),
        ("planned_end", task.planned_end.is_none()),
        ("expected_outcome", is_blank(&task.expected_outcome)),
        ("location_type", is_blank(&task.location_type)),
    ];
    let recommended = [
        ("description", is_blank(&task.description)),
        ("gps", task.gps.is_none()),
        ("location_name", is_blank(&task.location_name)),
    ];

    let mut score = 100.0;
    let mut flags = Vec::new();
    for (field, missing) in required {
        if missing {
            score -= 10.0;
            flags.push(format!("missing_{field}"));
        }
    }
    for (field, missing) in recommended {
        if missing {
            score -= 5.0;
            flags.push(format!("missing_{field}"));
        }
    }
    (f64::max(score, 0.0), flags)
}

fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / 60.0
}

pub fn time_accuracy(task: &Task, now: NaiveDateTime) -> (f64, Vec<String>) {
    match task.status {
        TaskStatus::InProgress => {
            let (Some(start), Some(end)) = (task.planned_start, task.planned_end) else {
                return (100.0, Vec::new());
            };
            let planned = minutes_between(start, end);
            if now <= end || planned <= 0.0 {
                return (100.0, Vec::new());
            }
            let overrun_pct = minutes_between(end, now) / planned * 100.0;
            if overrun_pct > 50.0 {
                (30.0, vec!["time_overrun_severe".to_string()])
            } else if overrun_pct > 20.0 {
                (60.0, vec!["time_overrun_high".to_string()])
            } else {
                (100.0, Vec::new())
            }
        }
        status if status.is_finished() => {
            let (Some(actual_start), Some(actual_end)) = (task.actual_start, task.actual_end) else {
                return (70.0, vec!["missing_actual_times".to_string()]);
            };
            let (Some(planned_start), Some(planned_end)) = (task.planned_start, task.planned_end) else {
                return (100.0, Vec::new());
            };
            let planned = minutes_between(planned_start, planned_end);
            if planned <= 0.0 {
                return (100.0, Vec::new());
            }
            let actual = minutes_between(actual_start, actual_end);
            let deviation_pct = (actual - planned).abs() / planned * 100.0;
            if deviation_pct <= 5.0 {
                return (100.0, Vec::new());
            }
            let score = f64::max(100.0 - (deviation_pct - 5.0) * 2.0, 0.0);
            let mut flags = Vec::new();
            if deviation_pct > 50.0 {
                flags.push("time_deviation_severe".to_string());
            } else if deviation_pct > 20.0 {
                flags.push("time_deviation_high".to_string());
            }
            (score, flags)
        }
        _ => (100.0, Vec::new()),
    }
}

pub fn evidence_quality(task: &Task, evidence: &[TaskEvidence]) -> (f64, Vec<String>) {
    if !task.status.is_finished() {
        return (100.0, Vec::new());
    }
    if evidence.is_empty() {
        return (0.0, vec!["no_evidence".to_string()]);
    }

    let mut score: f64 = 40.0;
    let mut flags = Vec::new();
    if evidence.iter().any(|e| e.evidence_type == EvidenceType::Photo) {
        score += 20.0;
    } else {
        flags.push("no_photo_evidence".to_string());
    }
    if evidence.iter().any(|e| e.evidence_type == EvidenceType::Note) {
        score += 15.0;
    }
    if evidence.iter().any(|e| e.is_validated) {
        score += 15.0;
    } else {
        flags.push("no_validated_evidence".to_string());
    }
    if evidence.iter().any(|e| e.gps.is_some()) {
        score += 10.0;
    }
    (score.min(100.0), flags)
}

pub fn material_consistency(materials: &[TaskMaterial]) -> (f64, Vec<String>) {
    let mut score = 100.0;
    let mut flags = Vec::new();
    for material in materials {
        if material.deviates() {
            score -= 5.0;
            flags.push(format!("material_deviation:{}", material.material_name));
        }
        if material.is_substitute {
            if is_blank(&material.substitute_notes) {
                score -= 15.0;
                flags.push(format!("undocumented_substitute:{}", material.material_name));
            } else {
                score -= 5.0;
            }
        }
    }
    (f64::max(score, 0.0), flags)
}

pub fn process_compliance(task: &Task, materials: &[TaskMaterial]) -> (f64, Vec<String>) {
    let mut score = 100.0;
    let mut flags = Vec::new();

    if let (Some(start), Some(end)) = (task.actual_start, task.actual_end) {
        if start > end {
            score -= 30.0;
            flags.push("invalid_time_sequence".to_string());
        }
    }
    if task.workaround_used && is_blank(&task.deviation_notes) {
        score -= 20.0;
        flags.push("undocumented_workaround".to_string());
    }
    let undocumented_deviation = materials
        .iter()
        .any(|m| m.deviates() && is_blank(&m.deviation_notes) && is_blank(&task.deviation_notes));
    if undocumented_deviation {
        score -= 15.0;
        flags.push("undocumented_material_deviation".to_string());
    }
    (f64::max(score, 0.0), flags)
}

pub fn location_validity(task: &Task) -> (f64, Vec<String>) {
    let needs_gps = matches!(task.status, TaskStatus::Completed | TaskStatus::Partial);
    if needs_gps && task.gps.is_none() {
        (70.0, vec!["missing_gps".to_string()])
    } else {
        (100.0, Vec::new())
    }
}

pub fn dependency_integrity(task: &Task) -> (f64, Vec<String>) {
    if task.status == TaskStatus::Blocked {
        (80.0, vec!["task_blocked".to_string()])
    } else {
        (100.0, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn full_task(status: TaskStatus) -> Task {
        let start = now() - Duration::hours(4);
        let end = now() - Duration::hours(2);
        Task {
            id: "t1".into(),
            job_id: "j1".into(),
            title: "Install irrigation".into(),
            description: Some("Drip line along the beds".into()),
            status,
            planned_start: Some(start),
            planned_end: Some(end),
            actual_start: status.is_finished().then_some(start),
            actual_end: status.is_finished().then_some(end),
            assigned_employee_id: Some("e1".into()),
            integrity_score: 100.0,
            integrity_flags: Vec::new(),
            gps: Some(GeoPoint { lat: 1.0, lng: 2.0 }),
            location_name: Some("Front yard".into()),
            location_type: Some("residential".into()),
            expected_outcome: Some("Beds watered".into()),
            workaround_used: false,
            deviation_notes: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn evidence(kind: EvidenceType, validated: bool, gps: bool) -> TaskEvidence {
        TaskEvidence {
            id: "ev".into(),
            task_id: "t1".into(),
            evidence_type: kind,
            file_path: None,
            note_text: None,
            measurement_value: None,
            gps: gps.then_some(GeoPoint { lat: 1.0, lng: 2.0 }),
            is_validated: validated,
            captured_offline: false,
            captured_at: now(),
        }
    }

    fn material(planned: f64, actual: f64) -> TaskMaterial {
        TaskMaterial {
            id: "m".into(),
            task_id: "t1".into(),
            material_name: "Mulch".into(),
            unit: None,
            planned_quantity: planned,
            actual_quantity: Some(actual),
            is_substitute: false,
            substitute_notes: None,
            deviation_notes: None,
        }
    }

    fn full_evidence() -> Vec<TaskEvidence> {
        vec![
            evidence(EvidenceType::Photo, true, true),
            evidence(EvidenceType::Note, false, false),
        ]
    }

    #[test]
    fn perfect_task_scores_exactly_100() {
        let task = full_task(TaskStatus::Completed);
        let result = calculate_full_integrity(&task, &full_evidence(), &[], now());
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, IntegrityLevel::Excellent);
        assert_eq!(result.trust, 1.0);
        assert!(result.flags.is_empty());
        assert!(result.breakdown.iter().all(|m| m.score == 100.0));
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = Metric::ALL.iter().map(|m| m.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn three_missing_required_fields_cost_thirty() {
        let mut task = full_task(TaskStatus::Planned);
        task.title = String::new();
        task.assigned_employee_id = None;
        task.expected_outcome = None;
        let (score, flags) = data_completeness(&task);
        assert_eq!(score, 70.0);
        assert_eq!(
            flags,
            vec!["missing_title", "missing_assignee", "missing_expected_outcome"]
        );
    }

    #[test]
    fn recommended_fields_cost_five_each_and_floor_at_zero() {
        let mut task = full_task(TaskStatus::Planned);
        task.description = Some("  ".into());
        task.gps = None;
        assert_eq!(data_completeness(&task).0, 90.0);

        task.title.clear();
        task.job_id.clear();
        task.assigned_employee_id = None;
        task.planned_start = None;
        task.planned_end = None;
        task.expected_outcome = None;
        task.location_type = None;
        task.location_name = None;
        assert_eq!(data_completeness(&task).0, 15.0);
    }

    #[test]
    fn unstarted_tasks_have_perfect_timing() {
        let task = full_task(TaskStatus::Planned);
        assert_eq!(time_accuracy(&task, now() + Duration::days(30)).0, 100.0);
    }

    #[test]
    fn in_progress_overrun_bands() {
        // planned window is 2h, ending 2h before now
        let task = full_task(TaskStatus::InProgress);
        let (score, flags) = time_accuracy(&task, now());
        assert_eq!(score, 30.0);
        assert_eq!(flags, vec!["time_overrun_severe"]);

        let end = task.planned_end.unwrap();
        assert_eq!(time_accuracy(&task, end + Duration::minutes(30)).0, 60.0);
        assert_eq!(time_accuracy(&task, end + Duration::minutes(20)).0, 100.0);
        assert_eq!(time_accuracy(&task, end - Duration::minutes(5)).0, 100.0);
    }

    #[test]
    fn completed_duration_deviation_penalty() {
        let mut task = full_task(TaskStatus::Completed);
        let start = task.actual_start.unwrap();

        // 125 minutes vs 120 planned is within the 5% tolerance
        task.actual_end = Some(start + Duration::minutes(125));
        assert_eq!(time_accuracy(&task, now()).0, 100.0);

        // 150 minutes = 25% deviation: 100 - 40 = 60, high
        task.actual_end = Some(start + Duration::minutes(150));
        let (score, flags) = time_accuracy(&task, now());
        assert!((score - 60.0).abs() < 1e-9);
        assert_eq!(flags, vec!["time_deviation_high"]);

        // 240 minutes = 100% deviation: floored at 0, severe
        task.actual_end = Some(start + Duration::minutes(240));
        let (score, flags) = time_accuracy(&task, now());
        assert_eq!(score, 0.0);
        assert_eq!(flags, vec!["time_deviation_severe"]);
    }

    #[test]
    fn finished_without_actual_times_is_degraded() {
        let mut task = full_task(TaskStatus::Completed);
        task.actual_end = None;
        assert_eq!(time_accuracy(&task, now()), (70.0, vec!["missing_actual_times".to_string()]));
    }

    #[test]
    fn evidence_scoring() {
        let planned = full_task(TaskStatus::Planned);
        assert_eq!(evidence_quality(&planned, &[]).0, 100.0);

        let done = full_task(TaskStatus::Completed);
        assert_eq!(evidence_quality(&done, &[]), (0.0, vec!["no_evidence".to_string()]));

        let only_note = vec![evidence(EvidenceType::Note, false, false)];
        let (score, flags) = evidence_quality(&done, &only_note);
        assert_eq!(score, 55.0);
        assert_eq!(flags, vec!["no_photo_evidence", "no_validated_evidence"]);

        let photo = vec![evidence(EvidenceType::Photo, true, true)];
        assert_eq!(evidence_quality(&done, &photo).0, 85.0);
        assert_eq!(evidence_quality(&done, &full_evidence()).0, 100.0);
    }

    #[test]
    fn material_deviation_and_substitutes() {
        assert_eq!(material_consistency(&[]).0, 100.0);

        let within = material(100.0, 110.0);
        assert_eq!(material_consistency(&[within]).0, 100.0);

        let over = material(100.0, 111.0);
        let (score, flags) = material_consistency(&[over]);
        assert_eq!(score, 95.0);
        assert_eq!(flags, vec!["material_deviation:Mulch"]);

        let mut sub = material(10.0, 10.0);
        sub.is_substitute = true;
        assert_eq!(material_consistency(&[sub.clone()]).0, 85.0);
        sub.substitute_notes = Some("Supplier out of stock".into());
        assert_eq!(material_consistency(&[sub]).0, 95.0);
    }

    #[test]
    fn process_compliance_deductions() {
        let mut task = full_task(TaskStatus::Completed);
        assert_eq!(process_compliance(&task, &[]).0, 100.0);

        task.actual_start = Some(now());
        task.actual_end = Some(now() - Duration::hours(1));
        task.workaround_used = true;
        let (score, flags) = process_compliance(&task, &[material(10.0, 20.0)]);
        assert_eq!(score, 35.0);
        assert_eq!(
            flags,
            vec![
                "invalid_time_sequence",
                "undocumented_workaround",
                "undocumented_material_deviation"
            ]
        );

        task.deviation_notes = Some("Used hand tools, gate too narrow".into());
        assert_eq!(process_compliance(&task, &[material(10.0, 20.0)]).0, 70.0);
    }

    #[test]
    fn location_and_dependency_metrics() {
        let mut done = full_task(TaskStatus::Partial);
        done.gps = None;
        assert_eq!(location_validity(&done).0, 70.0);
        let mut failed = full_task(TaskStatus::Failed);
        failed.gps = None;
        assert_eq!(location_validity(&failed).0, 100.0);

        assert_eq!(dependency_integrity(&full_task(TaskStatus::Blocked)).0, 80.0);
        assert_eq!(dependency_integrity(&full_task(TaskStatus::InProgress)).0, 100.0);
    }

    #[test]
    fn completed_without_evidence_loses_evidence_weight() {
        let task = full_task(TaskStatus::Completed);
        let result = calculate_full_integrity(&task, &[], &[], now());
        assert_eq!(result.score, 85.0);
        assert_eq!(result.metric(Metric::EvidenceQuality).unwrap().score, 0.0);
    }

    #[test]
    fn score_stays_in_range_for_worst_case() {
        let mut task = full_task(TaskStatus::Blocked);
        task.title.clear();
        task.job_id.clear();
        task.assigned_employee_id = None;
        task.planned_start = None;
        task.planned_end = None;
        task.expected_outcome = None;
        task.location_type = None;
        task.description = None;
        task.gps = None;
        task.location_name = None;
        task.workaround_used = true;
        let mut sub = material(1.0, 50.0);
        sub.is_substitute = true;
        let result = calculate_full_integrity(&task, &[], &vec![sub; 10], now());
        assert!(result.score >= 0.0 && result.score <= 100.0);
    }
}
