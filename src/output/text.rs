use crate::db::task_repo::StatusCounts;
use crate::graph::{StartCheck, TraversalHit};
use crate::integrity::{IntegritySummary, IntegrityUpdate};
use crate::models::{AiAlert, Employee, Job, Task, TaskDependency, TaskEvent, TaskEvidence, TaskMaterial};
use crate::operator::{Bottleneck, DailyBriefing, DeviationPattern, EmployeePerformanceContext, JobSituationReport};
use crate::risk::{DelayPropagation, FailurePropagation, JobRisk};

fn short(id: &str) -> &str {
    &id[..std::cmp::min(8, id.len())]
}

pub fn print_job_list(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    for j in jobs {
        println!("  {} [{}] {}", j.id, j.status.as_str(), j.title);
    }
}

pub fn print_employee_list(employees: &[Employee]) {
    if employees.is_empty() {
        println!("No employees found.");
        return;
    }
    for e in employees {
        match e.role {
            Some(ref role) => println!("  {} {} ({role})", e.id, e.name),
            None => println!("  {} {}", e.id, e.name),
        }
    }
}

pub fn print_task(t: &Task) {
    println!("Task: {} ({})", t.title, t.id);
    if let Some(ref desc) = t.description {
        println!("  Description: {desc}");
    }
    println!("  Status: {}", t.status.as_str());
    println!("  Integrity: {:.2}", t.integrity_score);
    if !t.integrity_flags.is_empty() {
        println!("  Flags: {}", t.integrity_flags.join(", "));
    }
    if let Some(ref employee) = t.assigned_employee_id {
        println!("  Assigned to: {employee}");
    }
    if let (Some(start), Some(end)) = (t.planned_start, t.planned_end) {
        println!("  Planned: {start} - {end}");
    }
    if let Some(started) = t.actual_start {
        println!("  Started: {started}");
    }
    if let Some(ended) = t.actual_end {
        println!("  Ended: {ended}");
    }
    if let Some(ref location) = t.location_name {
        println!("  Location: {location}");
    }
    if t.workaround_used {
        println!("  Workaround used: {}", t.deviation_notes.as_deref().unwrap_or("-"));
    }
}

pub fn print_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for t in tasks {
        let assigned = t.assigned_employee_id.as_deref().map(short).unwrap_or("");
        println!(
            "  [{}] {} ({}) integrity={:.1} {}",
            t.status.as_str(),
            t.title,
            short(&t.id),
            t.integrity_score,
            if assigned.is_empty() { String::new() } else { format!("@{assigned}") }
        );
    }
}

pub fn print_evidence(evidence: &[TaskEvidence]) {
    if evidence.is_empty() {
        return;
    }
    println!("\nEvidence:");
    for e in evidence {
        let detail = e
            .file_path
            .as_deref()
            .or(e.note_text.as_deref())
            .map(str::to_string)
            .or_else(|| e.measurement_value.map(|v| v.to_string()))
            .unwrap_or_default();
        println!(
            "  [{}] {} {}{}",
            e.evidence_type.as_str(),
            e.captured_at,
            detail,
            if e.is_validated { " (validated)" } else { "" }
        );
    }
}

pub fn print_materials(materials: &[TaskMaterial]) {
    if materials.is_empty() {
        return;
    }
    println!("\nMaterials:");
    for m in materials {
        let unit = m.unit.as_deref().unwrap_or("");
        let actual = m.actual_quantity.map_or("-".to_string(), |a| a.to_string());
        println!(
            "  {} planned={}{unit} actual={actual}{unit}{}",
            m.material_name,
            m.planned_quantity,
            if m.deviates() { " DEVIATES" } else { "" }
        );
    }
}

pub fn print_events(events: &[TaskEvent]) {
    if events.is_empty() {
        return;
    }
    println!("\nEvents:");
    for e in events {
        match e.payload.reason() {
            Some(reason) => println!("  {} {} ({reason})", e.occurred_at, e.event_type.as_str()),
            None => println!("  {} {}", e.occurred_at, e.event_type.as_str()),
        }
    }
}

pub fn print_dependency_list(deps: &[TaskDependency]) {
    if deps.is_empty() {
        println!("No dependencies found.");
        return;
    }
    for d in deps {
        println!(
            "  {} {} -> {} [{}] {}{} weight={} risk={}",
            short(&d.id),
            short(&d.predecessor_id),
            short(&d.successor_id),
            d.status.as_str(),
            d.dependency_type.as_str(),
            if d.is_hard { "" } else { " (soft)" },
            d.risk_weight,
            d.current_risk_level.as_str()
        );
    }
}

pub fn print_integrity_update(update: &IntegrityUpdate) {
    let r = &update.result;
    println!(
        "Integrity: {:.2} ({}) was {:.2}, trust {:.1}",
        r.score,
        r.level.as_str(),
        update.previous_score,
        r.trust
    );
    for m in &r.breakdown {
        println!("  {:<22} {:>6.1} x {:.2}", m.metric.as_str(), m.score, m.weight);
    }
    if !r.flags.is_empty() {
        println!("  Flags: {}", r.flags.join(", "));
    }
}

pub fn print_integrity_summary(s: &IntegritySummary) {
    println!(
        "Integrity: {:.2} ({}) over {} tasks",
        s.average_score,
        s.level.as_str(),
        s.task_count
    );
    let d = &s.distribution;
    println!(
        "  excellent={} good={} warning={} critical={} failed={}",
        d.excellent, d.good, d.warning, d.critical, d.failed
    );
    for c in &s.critical_tasks {
        println!("  ! {} ({}) {:.1} {}", c.title, short(&c.task_id), c.score, c.level.as_str());
    }
    for f in &s.common_flags {
        println!("  flag {} x{}", f.flag, f.count);
    }
}

pub fn print_start_check(check: &StartCheck) {
    if check.can_start {
        println!("Task {} can start.", check.task_id);
        return;
    }
    println!("Task {} is blocked by:", check.task_id);
    for b in &check.blocking_dependencies {
        println!(
            "  [{}] {} ({}) dependency {}",
            b.predecessor_status.as_str(),
            b.predecessor_title,
            short(&b.predecessor_id),
            b.dependency_status.as_str()
        );
    }
}

pub fn print_traversal(hits: &[TraversalHit]) {
    if hits.is_empty() {
        println!("No related tasks.");
        return;
    }
    for h in hits {
        println!(
            "  {}[{}] {} ({}) {}{}",
            "  ".repeat(h.depth.saturating_sub(1)),
            h.status.as_str(),
            h.title,
            short(&h.task_id),
            h.dependency_type.as_str(),
            if h.is_critical { " critical" } else { "" }
        );
    }
}

pub fn print_order(order: Option<&[String]>, cycles: &[Vec<String>]) {
    match order {
        Some(order) => {
            for (i, id) in order.iter().enumerate() {
                println!("  {:>3}. {id}", i + 1);
            }
        }
        None => println!("No order: dependencies contain {} cycle(s).", cycles.len()),
    }
}

pub fn print_cycles(cycles: &[Vec<String>]) {
    if cycles.is_empty() {
        println!("No cycles.");
        return;
    }
    for c in cycles {
        let ids: Vec<&str> = c.iter().map(|id| short(id)).collect();
        println!("  {} -> {}", ids.join(" -> "), ids.first().copied().unwrap_or(""));
    }
}

pub fn print_delay(p: &DelayPropagation) {
    println!(
        "Delay of {} min affects {} tasks, {:.1} h total",
        p.delay_minutes,
        p.affected_tasks.len(),
        p.total_impact_hours
    );
    for a in &p.affected_tasks {
        println!(
            "  {} ({}) +{:.0} min risk {} -> {}{}",
            a.title,
            short(&a.task_id),
            a.impact_minutes,
            a.previous_risk_level.as_str(),
            a.new_risk_level.as_str(),
            if a.is_critical { " critical" } else { "" }
        );
    }
    for m in &p.mitigations {
        println!("  - {m}");
    }
}

pub fn print_failure(p: &FailurePropagation) {
    println!(
        "Failure violated {} dependencies, {} tasks blocked",
        p.violated_dependencies.len(),
        p.blocked_tasks.len()
    );
    for b in &p.blocked_tasks {
        println!("  [{}] {} ({})", b.status.as_str(), b.title, short(&b.task_id));
    }
    for o in &p.recovery_options {
        println!("  - {}: {}", o.action, o.description);
    }
}

pub fn print_job_risk(r: &JobRisk) {
    let f = &r.factors;
    println!("Risk: {:.1} ({})", r.risk_score, r.risk_level.as_str());
    println!("  integrity {:.1} -> {:.1} pts", f.average_integrity, f.integrity_points);
    println!("  violated dependencies {} -> {:.1} pts", f.violated_dependencies, f.violated_points);
    println!("  blocked tasks {} -> {:.1} pts", f.blocked_tasks, f.blocked_points);
    println!("  overdue tasks {} -> {:.1} pts", f.overdue_tasks, f.overdue_points);
}

fn print_counts(c: &StatusCounts) {
    println!(
        "Tasks: {} (planned={} assigned={} in_progress={} completed={} partial={} failed={} blocked={} cancelled={})",
        c.total, c.planned, c.assigned, c.in_progress, c.completed, c.partial, c.failed, c.blocked, c.cancelled
    );
}

pub fn print_situation_report(r: &JobSituationReport) {
    println!("Job: {} ({}) [{}]", r.job.title, r.job.id, r.job.status.as_str());
    print_counts(&r.status_counts);
    print_integrity_summary(&r.integrity);
    println!("Risk: {:.1} ({})", r.risk.risk_score, r.risk.risk_level.as_str());
    if r.critical_path.deadline_at_risk {
        println!("Deadline at risk: {} tasks running late", r.critical_path.late_in_progress.len());
    }
    if !r.critical_path.cycles.is_empty() {
        println!("Dependency cycles: {}", r.critical_path.cycles.len());
    }
    for p in &r.deviation_patterns {
        println!("Pattern: {} '{}' x{}", p.event_type.as_str(), p.reason, p.occurrences);
    }
    for t in &r.resource_tensions {
        println!(
            "Overlap: {} has {} and {} overlapping by {} min",
            short(&t.employee_id),
            short(&t.first_task_id),
            short(&t.second_task_id),
            t.overlap_minutes
        );
    }
    if !r.attention_required.is_empty() {
        println!("\nAttention:");
        for a in &r.attention_required {
            println!("  [{}] {}", a.priority.as_str(), a.message);
        }
    }
}

pub fn print_employee_context(c: &EmployeePerformanceContext) {
    println!("Employee: {} ({})", c.employee.name, c.employee.id);
    println!("  Active tasks: {} (load {})", c.active_tasks, c.load.as_str());
    println!("  Completed last 30 days: {}", c.completed_last_30_days);
    if let Some(rate) = c.on_time_rate {
        println!("  On time: {:.0}%", rate * 100.0);
    }
    print_integrity_summary(&c.integrity);
}

pub fn print_bottlenecks(found: &[Bottleneck]) {
    if found.is_empty() {
        println!("No bottlenecks detected.");
        return;
    }
    for b in found {
        println!("  [{}] {} {}", b.severity.as_str(), b.kind.as_str(), b.message);
    }
}

pub fn print_alerts(alerts: &[AiAlert]) {
    if alerts.is_empty() {
        println!("No alerts.");
        return;
    }
    for a in alerts {
        println!("  {} [{}] {}: {}", a.created_at, a.severity.as_str(), a.title, a.message);
    }
}

pub fn print_patterns(patterns: &[DeviationPattern]) {
    if patterns.is_empty() {
        println!("No recurring deviations.");
        return;
    }
    for p in patterns {
        println!(
            "{} '{}' x{} (confidence {:.2}, {} tasks)",
            p.event_type.as_str(),
            p.reason,
            p.occurrences,
            p.confidence,
            p.affected_tasks.len()
        );
        println!("  {}", p.hypothesis);
        for action in &p.suggested_actions {
            println!("  - {action}");
        }
    }
}

pub fn print_briefing(b: &DailyBriefing) {
    println!("Briefing for {}", b.date);
    println!("{}", b.executive_summary);
    if !b.scheduled_tasks.is_empty() {
        println!("\nScheduled:");
        for t in &b.scheduled_tasks {
            println!("  [{}] {} ({})", t.status.as_str(), t.title, short(&t.task_id));
        }
    }
    if !b.overdue_tasks.is_empty() {
        println!("\nOverdue:");
        for o in &b.overdue_tasks {
            println!("  {} ({}) {} days", o.task.title, short(&o.task.task_id), o.days_overdue);
        }
    }
    if !b.attention_items.is_empty() {
        println!("\nAttention:");
        for a in &b.attention_items {
            println!("  [{}] {}", a.priority.as_str(), a.message);
        }
    }
}
