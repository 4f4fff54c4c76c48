use crate::cli::commands::RiskCommands;
use crate::cli::Context;
use crate::error::SiteopsError;
use crate::events::TaskEventService;
use crate::output;
use crate::risk::RiskPropagationService;

pub fn run(cmd: RiskCommands, ctx: &Context) -> i32 {
    let result = match cmd {
        RiskCommands::Delay { id, minutes } => run_delay(&id, minutes, ctx),
        RiskCommands::Failure { id } => run_failure(&id, ctx),
    };
    ctx.finish(result)
}

fn run_delay(id: &str, minutes: f64, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let sink = TaskEventService::new(&conn);
    let propagation = RiskPropagationService::new(&conn, &sink).propagate_delay(id, minutes)?;
    ctx.respond(output::json::to_data(&propagation)?, || {
        output::text::print_delay(&propagation);
    })
}

fn run_failure(id: &str, ctx: &Context) -> Result<i32, SiteopsError> {
    let conn = ctx.open()?;
    let sink = TaskEventService::new(&conn);
    let propagation = RiskPropagationService::new(&conn, &sink).propagate_failure(id)?;
    ctx.respond(output::json::to_data(&propagation)?, || {
        output::text::print_failure(&propagation);
    })
}
