use serde_json::json;

use crate::cli::commands::JobCommands;
use crate::cli::Context;
use crate::db::{job_repo, timestamp};
use crate::error::SiteopsError;
use crate::events::TaskEventService;
use crate::graph::DependencyGraphService;
use crate::integrity::AggregatedIntegrityService;
use crate::models::JobStatus;
use crate::operator::OperatorTaskInterface;
use crate::output;
use crate::risk::RiskPropagationService;

pub fn run(cmd: JobCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        JobCommands::Add { title } => run_add(&title, ctx),
        JobCommands::List => run_list(ctx),
        JobCommands::Status { id, status } => run_status(&id, &status, ctx),
        JobCommands::Report { id } => run_report(&id, ctx),
        JobCommands::Risk { id } => run_risk(&id, ctx),
        JobCommands::Order { id } => run_order(&id, ctx),
        JobCommands::Cycles { id } => run_cycles(&id, ctx),
        JobCommands::Integrity { id } => run_integrity(&id, ctx),
    };
    ctx.finish(result)
}

fn run_add(title: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    if title.trim().is_empty() {
        return Err(SiteopsError::validation("Job title must not be empty"));
    }
    let conn = ctx.open()?;
    let job = job_repo::create_job(&conn, title.trim(), timestamp::now())?;
    ctx.respond(json!({ "job": output::json::to_data(&job)? }), || {
        println!("Added job: {} ({})", job.title, job.id);
    })
}

fn run_list(ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let jobs = job_repo::list_jobs(&conn)?;
    ctx.respond(json!({ "jobs": output::json::to_data(&jobs)? }), || {
        output::text::print_job_list(&jobs);
    })
}

fn run_status(id: &str, status: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let status = JobStatus::from_str(status).ok_or_else(|| {
        SiteopsError::validation(format!(
            "Invalid job status '{status}'. Use active, on_hold, completed or cancelled"
        ))
    })?;
    let conn = ctx.open()?;
    job_repo::update_job_status(&conn, id, status)?;
    let job = job_repo::get_job_by_id(&conn, id)?;
    ctx.respond(json!({ "job": output::json::to_data(&job)? }), || {
        println!("Job {} is now {}", job.id, job.status.as_str());
    })
}

fn run_report(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let operator = OperatorTaskInterface::new(&conn, ctx.config()?);
    let report = operator.get_job_situation_report(id)?;
    ctx.respond(output::json::to_data(&report)?, || {
        output::text::print_situation_report(&report);
    })
}

fn run_risk(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let sink = TaskEventService::new(&conn);
    let risk = RiskPropagationService::new(&conn, &sink).calculate_job_risk_score(id)?;
    ctx.respond(output::json::to_data(&risk)?, || {
        output::text::print_job_risk(&risk);
    })
}

fn run_order(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    job_repo::get_job_by_id(&conn, id)?;
    let graph = DependencyGraphService::new(&conn);
    let order = graph.topological_sort(id)?;
    // only worth the second pass when there is no order to show
    let cycles = match order {
        Some(_) => Vec::new(),
        None => graph.detect_cycles(id)?,
    };
    ctx.respond(
        json!({
            "job_id": id,
            "has_order": order.is_some(),
            "order": order,
            "cycles": cycles,
        }),
        || output::text::print_order(order.as_deref(), &cycles),
    )
}

fn run_cycles(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    job_repo::get_job_by_id(&conn, id)?;
    let cycles = DependencyGraphService::new(&conn).detect_cycles(id)?;
    ctx.respond(
        json!({
            "job_id": id,
            "has_cycles": !cycles.is_empty(),
            "cycles": cycles,
        }),
        || output::text::print_cycles(&cycles),
    )
}

fn run_integrity(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let summary = AggregatedIntegrityService::new(&conn).job_summary(id)?;
    ctx.respond(output::json::to_data(&summary)?, || {
        output::text::print_integrity_summary(&summary);
    })
}
