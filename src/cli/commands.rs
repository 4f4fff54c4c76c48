use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

const VERSION: &str = env!("SITEOPS_VERSION");

#[derive(Parser)]
#[command(
    name = "siteops",
    version = VERSION,
    about = "Task integrity and dependency analytics for field-work jobs",
    after_help = "\
NOTE:
  DB defaults to .siteops/siteops.db in the working directory (override with --db or SITEOPS_DB).
  Analytics tunables are read from config.json next to the database.
  Run `siteops init` before any other command.

EXIT CODES:
  0  Success
  1  Error (DB, validation, not found, config)

LOGGING:
  Diagnostics go to stderr. Filter with SITEOPS_LOG (default: warn), or pass --verbose.

BEHAVIOR NOTES:
  Only hard dependencies block `task can-start`.
  A dependency that closes a cycle is stored and reported, not rejected.
  `task status` recalculates integrity and may emit an integrity_dropped event.
  `ops briefing --publish` stores the first briefing of a day and never overwrites it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Database file
    #[arg(long, global = true, env = "SITEOPS_DB")]
    pub db: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database (idempotent)
    Init,

    /// Jobs and job-level reports
    #[command(subcommand)]
    Job(JobCommands),

    /// Employees
    #[command(subcommand)]
    Employee(EmployeeCommands),

    /// Tasks, evidence, materials and integrity
    #[command(subcommand)]
    Task(TaskCommands),

    /// Task dependencies
    #[command(subcommand)]
    Dep(DepCommands),

    /// Delay and failure propagation
    #[command(subcommand)]
    Risk(RiskCommands),

    /// Operator reports: bottlenecks, patterns, briefings
    #[command(subcommand)]
    Ops(OpsCommands),
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Create a job
    Add {
        /// Job title
        title: String,
    },

    /// List jobs
    List,

    /// Change a job's status
    Status {
        /// Job ID
        id: String,
        /// active, on_hold, completed or cancelled
        status: String,
    },

    /// Full situation report for a job
    Report {
        /// Job ID
        id: String,
    },

    /// Job risk score and its factors
    Risk {
        /// Job ID
        id: String,
    },

    /// Topological order of the job's tasks
    Order {
        /// Job ID
        id: String,
    },

    /// Dependency cycles in the job
    Cycles {
        /// Job ID
        id: String,
    },

    /// Integrity summary across the job's tasks
    Integrity {
        /// Job ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum EmployeeCommands {
    /// Register an employee
    Add {
        /// Display name
        name: String,
        /// Role, e.g. foreman
        #[arg(long)]
        role: Option<String>,
    },

    /// List employees
    List,

    /// Workload, completion rate and integrity for one employee
    Context {
        /// Employee ID
        id: String,
    },
}

#[derive(Args)]
pub struct GpsArgs {
    /// Latitude
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,
    /// Longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task to a job
    Add {
        /// Job ID
        job: String,
        /// Task title
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Employee ID
        #[arg(long)]
        assignee: Option<String>,
        /// Planned start (YYYY-MM-DD HH:MM[:SS])
        #[arg(long)]
        start: Option<String>,
        /// Planned end (YYYY-MM-DD HH:MM[:SS])
        #[arg(long)]
        end: Option<String>,
        #[command(flatten)]
        gps: GpsArgs,
        #[arg(long)]
        location_name: Option<String>,
        #[arg(long)]
        location_type: Option<String>,
        #[arg(long)]
        expected_outcome: Option<String>,
        /// Predecessor task IDs (finish-to-start, hard)
        #[arg(long, num_args = 1..)]
        after: Vec<String>,
    },

    /// List a job's tasks
    List {
        /// Job ID
        job: String,
    },

    /// Show a task with its evidence, materials and events
    Show {
        /// Task ID
        id: String,
    },

    /// Change a task's status
    #[command(after_help = "\
STATUSES:
  planned, assigned, in_progress, completed, partial, failed, blocked, cancelled

NOTE:
  in_progress stamps actual_start; completed/partial/failed stamp actual_end.
  Outgoing finish-to-start dependencies are re-evaluated afterwards.")]
    Status {
        /// Task ID
        id: String,
        /// New status
        status: String,
        /// Reason, recorded on the blocked event
        #[arg(long)]
        reason: Option<String>,
    },

    /// Attach evidence to a task
    Evidence {
        /// Task ID
        id: String,
        /// photo, note or measurement
        #[arg(long = "type", default_value = "photo")]
        evidence_type: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        value: Option<f64>,
        #[command(flatten)]
        gps: GpsArgs,
        /// Mark the evidence as validated
        #[arg(long)]
        validated: bool,
        /// Captured without connectivity
        #[arg(long)]
        offline: bool,
    },

    /// Record a material line for a task
    Material {
        /// Task ID
        id: String,
        /// Material name
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        planned: f64,
        #[arg(long, allow_negative_numbers = true)]
        actual: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        /// Used as a substitute for the specified material
        #[arg(long)]
        substitute: bool,
        #[arg(long)]
        substitute_notes: Option<String>,
        #[arg(long)]
        deviation_notes: Option<String>,
    },

    /// Log a deviation event (material_shortage, time_deviation, weather_delay, ...)
    Deviation {
        /// Task ID
        id: String,
        /// Deviation event type
        #[arg(long = "type")]
        event_type: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record that a workaround was used
    Workaround {
        /// Task ID
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Correct the recorded actual start/end times
    Times {
        /// Task ID
        id: String,
        /// Actual start (YYYY-MM-DD HH:MM[:SS])
        #[arg(long)]
        start: Option<String>,
        /// Actual end (YYYY-MM-DD HH:MM[:SS])
        #[arg(long)]
        end: Option<String>,
    },

    /// Recalculate and store the task's integrity score
    Integrity {
        /// Task ID
        id: String,
        /// Score without storing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether hard dependencies allow the task to start
    CanStart {
        /// Task ID
        id: String,
    },

    /// Tasks that depend on this one, transitively
    Downstream {
        /// Task ID
        id: String,
        /// Stop after this many hops
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Tasks this one depends on, transitively
    Upstream {
        /// Task ID
        id: String,
        /// Stop after this many hops
        #[arg(long)]
        depth: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum DepCommands {
    /// Add a dependency: <successor> depends on <predecessor>
    Add {
        /// Task that must come first
        predecessor: String,
        /// Task that waits
        successor: String,
        /// finish_to_start, start_to_start, finish_to_finish, temporal, resource
        #[arg(long = "type", default_value = "finish_to_start")]
        dependency_type: String,
        /// Does not block the successor from starting
        #[arg(long)]
        soft: bool,
        /// On the critical path
        #[arg(long)]
        critical: bool,
        /// Share of a predecessor delay passed on to the successor
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        weight: f64,
    },

    /// List a job's dependencies
    List {
        /// Job ID
        job: String,
    },

    /// Re-evaluate a dependency's status from its predecessor
    Refresh {
        /// Dependency ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RiskCommands {
    /// Push a delay onto every downstream task
    Delay {
        /// Delayed task ID
        id: String,
        /// Delay in minutes
        #[arg(allow_negative_numbers = true)]
        minutes: f64,
    },

    /// Violate hard downstream dependencies of a failed task
    Failure {
        /// Failed task ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum OpsCommands {
    /// Detect bottlenecks without storing anything
    Bottlenecks {
        /// Limit to one job
        #[arg(long)]
        job: Option<String>,
    },

    /// Detect bottlenecks and store new alerts
    Scan {
        /// Limit to one job
        #[arg(long)]
        job: Option<String>,
    },

    /// Stored alerts, newest first
    Alerts {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Recurring deviations
    Patterns {
        /// Limit to one job
        #[arg(long)]
        job: Option<String>,
        /// Minimum occurrences (default from config.json)
        #[arg(long)]
        min: Option<usize>,
    },

    /// Daily briefing
    Briefing {
        /// Day (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<String>,
        /// Store the briefing; an existing snapshot for the day is returned unchanged
        #[arg(long)]
        publish: bool,
    },
}
