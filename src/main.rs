use clap::Parser;
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

use siteops::cli;
use siteops::cli::commands::{Cli, Commands};
use siteops::cli::Context;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("siteops=debug")
    } else {
        EnvFilter::try_from_env("SITEOPS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout carries the JSON envelope
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli_args = Cli::parse();
    init_logging(cli_args.verbose);
    let ctx = Context::new(cli_args.json, cli_args.db);

    let exit_code = match cli_args.command {
        Commands::Init => cli::init::run(&ctx),
        Commands::Job(cmd) => cli::job::run(cmd, &ctx),
        Commands::Employee(cmd) => cli::employee::run(cmd, &ctx),
        Commands::Task(cmd) => cli::task::run(cmd, &ctx),
        Commands::Dep(cmd) => cli::dep::run(cmd, &ctx),
        Commands::Risk(cmd) => cli::risk::run(cmd, &ctx),
        Commands::Ops(cmd) => cli::ops::run(cmd, &ctx),
    };

    process::exit(exit_code);
}
