use chrono::NaiveDate;
use serde_json::json;

use crate::cli::commands::OpsCommands;
use crate::cli::Context;
use crate::db::{alert_repo, job_repo, timestamp};
use crate::error::SiteopsError;
use crate::operator::{OperatorTaskInterface, Scope};
use crate::output;

pub fn run(cmd: OpsCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        OpsCommands::Bottlenecks { job } => run_bottlenecks(scope(job), ctx),
        OpsCommands::Scan { job } => run_scan(scope(job), ctx),
        OpsCommands::Alerts { limit } => run_alerts(limit, ctx),
        OpsCommands::Patterns { job, min } => run_patterns(scope(job), min, ctx),
        OpsCommands::Briefing { date, publish } => run_briefing(date.as_deref(), publish, ctx),
    };
    ctx.finish(result)
}

fn scope(job: Option<String>) -> Scope {
    job.map_or(Scope::System, Scope::Job)
}

fn run_bottlenecks(scope: Scope, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let found = OperatorTaskInterface::new(&conn, ctx.config()?).detect_bottlenecks(&scope)?;
    ctx.respond(json!({ "bottlenecks": output::json::to_data(&found)? }), || {
        output::text::print_bottlenecks(&found);
    })
}

fn run_scan(scope: Scope, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let outcome = OperatorTaskInterface::new(&conn, ctx.config()?).run_bottleneck_scan(&scope)?;
    ctx.respond(output::json::to_data(&outcome)?, || {
        println!(
            "Scan {}: {} bottlenecks, {} new alerts",
            outcome.period,
            outcome.detected,
            outcome.new_alerts.len()
        );
        output::text::print_alerts(&outcome.new_alerts);
    })
}

fn run_alerts(limit: usize, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let alerts = alert_repo::list_alerts(&conn, limit)?;
    ctx.respond(json!({ "alerts": output::json::to_data(&alerts)? }), || {
        output::text::print_alerts(&alerts);
    })
}

fn run_patterns(scope: Scope, min: Option<usize>, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    if let Some(job_id) = scope.job_id() {
        job_repo::get_job_by_id(&conn, job_id)?;
    }
    let operator = OperatorTaskInterface::new(&conn, ctx.config()?);
    let min = min.unwrap_or(operator.config().min_pattern_occurrences);
    let patterns = operator.analyze_deviation_patterns(&scope, min)?;
    ctx.respond(
        json!({
            "min_occurrences": min,
            "patterns": output::json::to_data(&patterns)?,
        }),
        || output::text::print_patterns(&patterns),
    )
}

fn run_briefing(date: Option<&str>, publish: bool, ctx: &Context) -> Result<i32, SiteopsError> {
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| SiteopsError::validation(format!("--date: expected YYYY-MM-DD, got '{raw}'")))?,
        None => timestamp::now().date(),
    };
    let conn = ctx.open()?;
    let operator = OperatorTaskInterface::new(&conn, ctx.config()?);

    if publish {
        let published = operator.publish_daily_briefing(date)?;
        return ctx.respond(output::json::to_data(&published)?, || {
            if published.created {
                println!("Published briefing for {date}");
            } else {
                println!("Briefing for {date} was already published at {}", published.briefing.created_at);
            }
            if let Some(summary) = published.briefing.payload["executive_summary"].as_str() {
                println!("{summary}");
            }
        });
    }

    let briefing = operator.generate_daily_briefing(date)?;
    ctx.respond(output::json::to_data(&briefing)?, || {
        output::text::print_briefing(&briefing);
    })
}
