use serde_json::json;

use crate::cli::commands::DepCommands;
use crate::cli::Context;
use crate::db::{dependency_repo, job_repo};
use crate::error::SiteopsError;
use crate::graph::DependencyGraphService;
use crate::models::{DependencyType, NewDependency};
use crate::output;

pub fn run(cmd: DepCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        DepCommands::Add {
            predecessor,
            successor,
            dependency_type,
            soft,
            critical,
            weight,
        } => {
            DependencyType::from_str(&dependency_type)
                .ok_or_else(|| {
                    SiteopsError::validation(format!(
                        "Invalid dependency type '{dependency_type}'. Use finish_to_start, start_to_start, \
                         finish_to_finish, temporal or resource"
                    ))
                })
                .and_then(|dependency_type| {
                    let dep = NewDependency {
                        predecessor_id: predecessor,
                        successor_id: successor,
                        dependency_type,
                        is_critical: critical,
                        is_hard: !soft,
                        risk_weight: weight,
                    };
                    run_add(&dep, ctx)
                })
        }
        DepCommands::List { job } => run_list(&job, ctx),
        DepCommands::Refresh { id } => run_refresh(&id, ctx),
    };
    ctx.finish(result)
}

fn run_add(dep: &NewDependency, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let added = DependencyGraphService::new(&conn).add_dependency(dep)?;
    let mut dep_json = output::json::dependency_summary(&added.dependency);
    dep_json["creates_cycle"] = json!(added.creates_cycle);
    ctx.respond(json!({ "dependency": dep_json }), || {
        let d = &added.dependency;
        println!(
            "Added dependency {}: {} -> {} [{}]",
            d.id,
            d.predecessor_id,
            d.successor_id,
            d.status.as_str()
        );
        if added.creates_cycle {
            println!("Warning: this dependency closes a cycle; the job has no valid order until it is removed.");
        }
    })
}

fn run_list(job_id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    job_repo::get_job_by_id(&conn, job_id)?;
    let deps = dependency_repo::list_for_job(&conn, job_id)?;
    let adjacency = DependencyGraphService::new(&conn).build_adjacency_list(job_id)?;
    let deps_json: Vec<_> = deps.iter().map(output::json::dependency_summary).collect();
    ctx.respond(
        json!({
            "dependencies": deps_json,
            "adjacency": adjacency,
        }),
        || output::text::print_dependency_list(&deps),
    )
}

fn run_refresh(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let dep = DependencyGraphService::new(&conn).update_dependency_status(id)?;
    ctx.respond(json!({ "dependency": output::json::dependency_summary(&dep) }), || {
        println!("Dependency {} is {}", dep.id, dep.status.as_str());
    })
}
