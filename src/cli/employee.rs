use serde_json::json;

use crate::cli::commands::EmployeeCommands;
use crate::cli::Context;
use crate::db::employee_repo;
use crate::error::SiteopsError;
use crate::operator::OperatorTaskInterface;
use crate::output;

pub fn run(cmd: EmployeeCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        EmployeeCommands::Add { name, role } => run_add(&name, role.as_deref(), ctx),
        EmployeeCommands::List => run_list(ctx),
        EmployeeCommands::Context { id } => run_context(&id, ctx),
    };
    ctx.finish(result)
}

fn run_add(name: &str, role: Option<&str>, ctx: &Context) -> Result<i32, SiteopsError> {
    if name.trim().is_empty() {
        return Err(SiteopsError::validation("Employee name must not be empty"));
    }
    let conn = ctx.open()?;
    let employee = employee_repo::create_employee(&conn, name.trim(), role)?;
    ctx.respond(json!({ "employee": output::json::to_data(&employee)? }), || {
        println!("Added employee: {} ({})", employee.name, employee.id);
    })
}

fn run_list(ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let employees = employee_repo::list_employees(&conn)?;
    ctx.respond(json!({ "employees": output::json::to_data(&employees)? }), || {
        output::text::print_employee_list(&employees);
    })
}

fn run_context(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let context = OperatorTaskInterface::new(&conn, ctx.config()?).get_employee_performance_context(id)?;
    ctx.respond(output::json::to_data(&context)?, || {
        output::text::print_employee_context(&context);
    })
}
