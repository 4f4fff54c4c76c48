use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::TaskCommands;
use crate::cli::{gps, parse_time, Context, GpsArgs};
use crate::db::{employee_repo, event_repo, evidence_repo, job_repo, material_repo, task_repo, timestamp};
use crate::error::SiteopsError;
use crate::events::{EventSink, Notification, TaskEventService};
use crate::graph::{AddedDependency, DependencyGraphService};
use crate::integrity::{IntegrityUpdate, TaskIntegrityService};
use crate::models::{
    EventPayload, EvidenceType, NewDependency, NewEvidence, NewMaterial, NewTask, NewTaskEvent, TaskEventType,
    TaskStatus,
};
use crate::output;

pub fn run(cmd: TaskCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        TaskCommands::Add {
            job,
            title,
            description,
            assignee,
            start,
            end,
            gps,
            location_name,
            location_type,
            expected_outcome,
            after,
        } => {
            let fields = TaskFields {
                description,
                assignee,
                start,
                end,
                gps,
                location_name,
                location_type,
                expected_outcome,
            };
            run_add(&job, &title, fields, &after, ctx)
        }
        TaskCommands::List { job } => run_list(&job, ctx),
        TaskCommands::Show { id } => run_show(&id, ctx),
        TaskCommands::Status { id, status, reason } => run_status(&id, &status, reason.as_deref(), ctx),
        TaskCommands::Evidence {
            id,
            evidence_type,
            file,
            note,
            value,
            gps,
            validated,
            offline,
        } => {
            let evidence = EvidenceInput {
                evidence_type,
                file,
                note,
                value,
                gps,
                validated,
                offline,
            };
            run_evidence(&id, evidence, ctx)
        }
        TaskCommands::Material {
            id,
            name,
            planned,
            actual,
            unit,
            substitute,
            substitute_notes,
            deviation_notes,
        } => {
            let material = NewMaterial {
                task_id: id,
                material_name: name,
                unit,
                planned_quantity: planned,
                actual_quantity: actual,
                is_substitute: substitute,
                substitute_notes,
                deviation_notes,
            };
            run_material(material, ctx)
        }
        TaskCommands::Deviation {
            id,
            event_type,
            reason,
            notes,
        } => run_deviation(&id, &event_type, &reason, notes, ctx),
        TaskCommands::Workaround { id, notes } => run_workaround(&id, notes.as_deref(), ctx),
        TaskCommands::Times { id, start, end } => run_times(&id, start.as_deref(), end.as_deref(), ctx),
        TaskCommands::Integrity { id, dry_run } => run_integrity(&id, dry_run, ctx),
        TaskCommands::CanStart { id } => run_can_start(&id, ctx),
        TaskCommands::Downstream { id, depth } => run_traversal(&id, depth, true, ctx),
        TaskCommands::Upstream { id, depth } => run_traversal(&id, depth, false, ctx),
    };
    ctx.finish(result)
}

struct TaskFields {
    description: Option<String>,
    assignee: Option<String>,
    start: Option<String>,
    end: Option<String>,
    gps: GpsArgs,
    location_name: Option<String>,
    location_type: Option<String>,
    expected_outcome: Option<String>,
}

struct EvidenceInput {
    evidence_type: String,
    file: Option<String>,
    note: Option<String>,
    value: Option<f64>,
    gps: GpsArgs,
    validated: bool,
    offline: bool,
}

fn integrity_json(update: &IntegrityUpdate) -> serde_json::Value {
    json!({
        "score": update.result.score,
        "previous_score": update.previous_score,
        "level": update.result.level.as_str(),
        "flags": update.result.flags,
        "notification": update.notification,
    })
}

fn recalculate(
    conn: &Connection,
    sink: &dyn EventSink,
    task_id: &str,
    emit_events: bool,
) -> Result<IntegrityUpdate, SiteopsError> {
    TaskIntegrityService::new(conn, sink).recalculate_and_update(task_id, emit_events)
}

fn run_add(
    job_id: &str,
    title: &str,
    fields: TaskFields,
    after: &[String],
    ctx: &Context,
) -> Result<i32, SiteopsError> {
    if title.trim().is_empty() {
        return Err(SiteopsError::validation("Task title must not be empty"));
    }
    let planned_start = parse_time(fields.start.as_deref(), "start")?;
    let planned_end = parse_time(fields.end.as_deref(), "end")?;
    if let (Some(start), Some(end)) = (planned_start, planned_end) {
        if end < start {
            return Err(SiteopsError::validation("--end must not be before --start"));
        }
    }

    let conn = ctx.open()?;
    let job = job_repo::get_job_by_id(&conn, job_id)?;
    if let Some(ref employee_id) = fields.assignee {
        employee_repo::get_employee_by_id(&conn, employee_id)?;
    }
    // Resolve predecessors before any writes to fail fast
    for predecessor in after {
        task_repo::get_task_by_id(&conn, predecessor)?;
    }

    let new_task = NewTask {
        job_id: job.id.clone(),
        title: title.trim().to_string(),
        description: fields.description,
        status: None,
        planned_start,
        planned_end,
        assigned_employee_id: fields.assignee,
        gps: gps(&fields.gps),
        location_name: fields.location_name,
        location_type: fields.location_type,
        expected_outcome: fields.expected_outcome,
    };

    // Atomic: task + dependencies
    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<_, SiteopsError> {
        let task = task_repo::create_task(&conn, &new_task, timestamp::now())?;
        let graph = DependencyGraphService::new(&conn);
        let added = after
            .iter()
            .map(|predecessor| graph.add_dependency(&NewDependency::finish_to_start(predecessor, &task.id)))
            .collect::<Result<Vec<AddedDependency>, _>>()?;
        Ok((task, added))
    })();
    let (task, added) = match result {
        Ok(created) => {
            conn.execute_batch("COMMIT")?;
            created
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    let sink = TaskEventService::new(&conn);
    let notification = Notification::attempt(
        &sink,
        NewTaskEvent::new(&task.id, TaskEventType::Created, EventPayload::Empty).from_source("cli"),
    );
    let update = recalculate(&conn, &sink, &task.id, false)?;
    let task = update.task.clone();

    let deps_json: Vec<_> = added
        .iter()
        .map(|a| {
            let mut v = output::json::dependency_summary(&a.dependency);
            v["creates_cycle"] = json!(a.creates_cycle);
            v
        })
        .collect();
    ctx.respond(
        json!({
            "task": output::json::task_summary(&task),
            "dependencies": deps_json,
            "integrity": integrity_json(&update),
            "notification": notification,
        }),
        || {
            println!("Added task: {} ({})", task.title, task.id);
            if added.iter().any(|a| a.creates_cycle) {
                println!("Warning: a dependency closes a cycle in job {}", task.job_id);
            }
        },
    )
}

fn run_list(job_id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    job_repo::get_job_by_id(&conn, job_id)?;
    let tasks = task_repo::list_tasks_by_job(&conn, job_id)?;
    let counts = task_repo::status_counts(&conn, job_id)?;
    let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
    ctx.respond(
        json!({
            "tasks": tasks_json,
            "counts": output::json::to_data(&counts)?,
        }),
        || output::text::print_task_list(&tasks),
    )
}

fn run_show(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let task = task_repo::get_task_by_id(&conn, id)?;
    let evidence = evidence_repo::list_for_task(&conn, &task.id)?;
    let materials = material_repo::list_for_task(&conn, &task.id)?;
    let events = event_repo::list_for_task(&conn, &task.id)?;
    let start = DependencyGraphService::new(&conn).check_can_start(&task.id)?;

    ctx.respond(
        json!({
            "task": output::json::to_data(&task)?,
            "can_start": start.can_start,
            "evidence": output::json::to_data(&evidence)?,
            "materials": output::json::to_data(&materials)?,
            "events": output::json::to_data(&events)?,
        }),
        || {
            output::text::print_task(&task);
            if !start.can_start {
                println!("  Blocked by {} dependencies", start.blocking_dependencies.len());
            }
            output::text::print_evidence(&evidence);
            output::text::print_materials(&materials);
            output::text::print_events(&events);
        },
    )
}

fn run_status(id: &str, status: &str, reason: Option<&str>, ctx: &Context) -> Result<i32, SiteopsError> {
    let new_status = TaskStatus::from_str(status).ok_or_else(|| {
        let valid: Vec<&str> = TaskStatus::ALL.iter().map(TaskStatus::as_str).collect();
        SiteopsError::validation(format!("Invalid status '{status}'. Use one of: {}", valid.join(", ")))
    })?;

    let conn = ctx.open()?;
    let before = task_repo::get_task_by_id(&conn, id)?;
    let now = timestamp::now();

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<_, SiteopsError> {
        task_repo::update_task_status(&conn, &before.id, new_status, now)?;
        DependencyGraphService::new(&conn)
            .with_now(now)
            .sync_successor_dependencies(&before.id)
    })();
    let dependencies = match result {
        Ok(deps) => {
            conn.execute_batch("COMMIT")?;
            deps
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    let sink = TaskEventService::new(&conn).with_now(now);
    let mut notifications = vec![Notification::attempt(
        &sink,
        NewTaskEvent::new(
            &before.id,
            TaskEventType::StatusChanged,
            EventPayload::StatusChanged {
                from: before.status,
                to: new_status,
            },
        )
        .from_source("cli"),
    )];
    if new_status == TaskStatus::Blocked {
        let payload = EventPayload::Blocked {
            reason: reason.unwrap_or_default().to_string(),
            blocking_task_id: None,
        };
        notifications.push(Notification::attempt(
            &sink,
            NewTaskEvent::new(&before.id, TaskEventType::Blocked, payload).from_source("cli"),
        ));
    } else if before.status == TaskStatus::Blocked {
        notifications.push(Notification::attempt(
            &sink,
            NewTaskEvent::new(&before.id, TaskEventType::Unblocked, EventPayload::Empty).from_source("cli"),
        ));
    }

    let update = TaskIntegrityService::new(&conn, &sink)
        .with_now(now)
        .recalculate_and_update(&before.id, true)?;
    let task = &update.task;

    let deps_json: Vec<_> = dependencies.iter().map(output::json::dependency_summary).collect();
    ctx.respond(
        json!({
            "task": output::json::task_summary(task),
            "previous_status": before.status.as_str(),
            "dependencies": deps_json,
            "integrity": integrity_json(&update),
            "notifications": notifications,
        }),
        || {
            println!(
                "Task {}: {} -> {} (integrity {:.2})",
                task.id,
                before.status.as_str(),
                task.status.as_str(),
                task.integrity_score
            );
            for d in &dependencies {
                println!("  dependency {} is {}", d.id, d.status.as_str());
            }
        },
    )
}

fn run_evidence(id: &str, input: EvidenceInput, ctx: &Context) -> Result<i32, SiteopsError> {
    let evidence_type = EvidenceType::from_str(&input.evidence_type).ok_or_else(|| {
        SiteopsError::validation(format!(
            "Invalid evidence type '{}'. Use photo, note or measurement",
            input.evidence_type
        ))
    })?;
    match evidence_type {
        EvidenceType::Note if input.note.is_none() => {
            return Err(SiteopsError::validation("Note evidence needs --note"));
        }
        EvidenceType::Measurement if input.value.is_none() => {
            return Err(SiteopsError::validation("Measurement evidence needs --value"));
        }
        _ => {}
    }

    let conn = ctx.open()?;
    let task = task_repo::get_task_by_id(&conn, id)?;
    let new_evidence = NewEvidence {
        task_id: task.id.clone(),
        evidence_type,
        file_path: input.file,
        note_text: input.note,
        measurement_value: input.value,
        gps: gps(&input.gps),
        is_validated: input.validated,
        captured_offline: input.offline,
    };
    let evidence = evidence_repo::add_evidence(&conn, &new_evidence, timestamp::now())?;

    let sink = TaskEventService::new(&conn);
    let update = recalculate(&conn, &sink, &task.id, true)?;
    ctx.respond(
        json!({
            "evidence": output::json::to_data(&evidence)?,
            "integrity": integrity_json(&update),
        }),
        || {
            println!("Added {} evidence to {}", evidence.evidence_type.as_str(), task.id);
            println!("Integrity: {:.2} ({})", update.result.score, update.result.level.as_str());
        },
    )
}

fn run_material(material: NewMaterial, ctx: &Context) -> Result<i32, SiteopsError> {
    let quantities = [Some(material.planned_quantity), material.actual_quantity];
    if quantities.iter().flatten().any(|q| !q.is_finite() || *q < 0.0) {
        return Err(SiteopsError::validation("Quantities must be non-negative numbers"));
    }
    if material.material_name.trim().is_empty() {
        return Err(SiteopsError::validation("Material name must not be empty"));
    }

    let conn = ctx.open()?;
    let task = task_repo::get_task_by_id(&conn, &material.task_id)?;
    let stored = material_repo::add_material(&conn, &material)?;

    let sink = TaskEventService::new(&conn);
    let notification = if stored.deviates() {
        let payload = EventPayload::Deviation {
            reason: stored.material_name.clone(),
            notes: stored.deviation_notes.clone(),
        };
        Notification::attempt(
            &sink,
            NewTaskEvent::new(&task.id, TaskEventType::MaterialDeviation, payload).from_source("cli"),
        )
    } else {
        Notification::NotRequired
    };
    let update = recalculate(&conn, &sink, &task.id, true)?;

    ctx.respond(
        json!({
            "material": output::json::to_data(&stored)?,
            "deviates": stored.deviates(),
            "notification": notification,
            "integrity": integrity_json(&update),
        }),
        || {
            println!("Recorded {} for {}", stored.material_name, task.id);
            if let Some(ratio) = stored.deviation_ratio().filter(|_| stored.deviates()) {
                println!("  Deviates from plan by {:.0}%", ratio * 100.0);
            }
            println!("Integrity: {:.2} ({})", update.result.score, update.result.level.as_str());
        },
    )
}

fn run_deviation(
    id: &str,
    event_type: &str,
    reason: &str,
    notes: Option<String>,
    ctx: &Context,
) -> Result<i32, SiteopsError> {
    let event_type = TaskEventType::from_str(event_type)
        .filter(TaskEventType::is_deviation)
        .ok_or_else(|| {
            let valid: Vec<&str> = TaskEventType::DEVIATIONS.iter().map(TaskEventType::as_str).collect();
            SiteopsError::validation(format!(
                "Invalid deviation type '{event_type}'. Use one of: {}",
                valid.join(", ")
            ))
        })?;

    let conn = ctx.open()?;
    let payload = match event_type {
        TaskEventType::Blocked => EventPayload::Blocked {
            reason: reason.to_string(),
            blocking_task_id: None,
        },
        _ => EventPayload::Deviation {
            reason: reason.to_string(),
            notes,
        },
    };
    // The event is the point of this command, so a failed write is an error.
    let event = TaskEventService::new(&conn).emit(NewTaskEvent::new(id, event_type, payload).from_source("cli"))?;
    ctx.respond(json!({ "event": output::json::to_data(&event)? }), || {
        println!("Logged {} on {} ({})", event.event_type.as_str(), event.task_id, event.id);
    })
}

fn run_workaround(id: &str, notes: Option<&str>, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    task_repo::record_workaround(&conn, id, notes)?;
    let sink = TaskEventService::new(&conn);
    let update = recalculate(&conn, &sink, id, true)?;
    ctx.respond(
        json!({
            "task": output::json::task_summary(&update.task),
            "integrity": integrity_json(&update),
        }),
        || {
            println!("Workaround recorded on {}", update.task.id);
            println!("Integrity: {:.2} ({})", update.result.score, update.result.level.as_str());
        },
    )
}

fn run_times(id: &str, start: Option<&str>, end: Option<&str>, ctx: &Context) -> Result<i32, SiteopsError> {
    let actual_start = parse_time(start, "start")?;
    let actual_end = parse_time(end, "end")?;

    let conn = ctx.open()?;
    let task = task_repo::get_task_by_id(&conn, id)?;
    // A reversed pair is stored as given; integrity flags it.
    task_repo::set_actual_times(
        &conn,
        &task.id,
        actual_start.or(task.actual_start),
        actual_end.or(task.actual_end),
    )?;
    let sink = TaskEventService::new(&conn);
    let update = recalculate(&conn, &sink, &task.id, true)?;
    ctx.respond(
        json!({
            "task": output::json::to_data(&update.task)?,
            "integrity": integrity_json(&update),
        }),
        || {
            output::text::print_task(&update.task);
            println!("Integrity: {:.2} ({})", update.result.score, update.result.level.as_str());
        },
    )
}

fn run_integrity(id: &str, dry_run: bool, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let sink = TaskEventService::new(&conn);
    if dry_run {
        let result = TaskIntegrityService::new(&conn, &sink).evaluate(id)?;
        return ctx.respond(json!({ "result": output::json::to_data(&result)?, "stored": false }), || {
            println!("Integrity (not stored): {:.2} ({})", result.score, result.level.as_str());
            if !result.flags.is_empty() {
                println!("  Flags: {}", result.flags.join(", "));
            }
        });
    }
    let update = recalculate(&conn, &sink, id, true)?;
    ctx.respond(output::json::to_data(&update)?, || {
        output::text::print_integrity_update(&update);
    })
}

fn run_can_start(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let check = DependencyGraphService::new(&conn).check_can_start(id)?;
    ctx.respond(output::json::to_data(&check)?, || {
        output::text::print_start_check(&check);
    })
}

fn run_traversal(id: &str, depth: Option<usize>, downstream: bool, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let task = task_repo::get_task_by_id(&conn, id)?;
    let graph = DependencyGraphService::new(&conn);
    let direction = if downstream { "downstream" } else { "upstream" };
    let hits = if downstream {
        graph.get_downstream_tasks(&task.id, depth)?
    } else {
        graph.get_upstream_tasks(&task.id, depth)?
    };
    ctx.respond(
        json!({
            "task_id": task.id,
            "direction": direction,
            "tasks": output::json::to_data(&hits)?,
        }),
        || output::text::print_traversal(&hits),
    )
}
