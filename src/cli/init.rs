use serde_json::json;

use crate::cli::Context;
use crate::db::connection;
use crate::error::SiteopsError;

pub fn run(ctx: &Context) -> i32 {
    ctx.finish(run_init(ctx))
}

fn run_init(ctx: &Context) -> Result<i32, SiteopsError> {
    let path = connection::init_db(&ctx.db_path)?;
    // surface a broken config.json now rather than on the first report
    ctx.config()?;
    tracing::info!(path = %path.display(), "database initialized");
    ctx.respond(json!({ "path": path.to_string_lossy() }), || {
        println!("Initialized siteops at {}", path.display());
    })
}
