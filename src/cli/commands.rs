use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tb", about = concat!("tb v", env!("CARGO_PKG_VERSION"), " - board, list, calendar and gantt views of a project's tasks"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different board directory
    #[arg(short = 'C', long = "board-dir", global = true)]
    pub board_dir: Option<String>,

    /// Project id (default: the last one used, else the first listed)
    #[arg(short = 'p', long, global = true)]
    pub project: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create taskboard.toml and an empty backend file here
    Init(InitArgs),
    /// List the backend's projects
    Projects,
    /// Show tasks in status lanes, grouped by project
    Board(BoardArgs),
    /// Show tasks as a sorted list
    List(ListArgs),
    /// Search titles, descriptions and tags by regex
    Search(SearchArgs),
    /// Show a month of tasks by day
    Calendar(CalendarArgs),
    /// Show a gantt chart
    Gantt(GanttArgs),
    /// Show late tasks
    Delayed(DelayedArgs),
    /// Create a task
    Add(AddArgs),
    /// Drop a task into a status lane
    Move(MoveArgs),
    /// Change task fields
    Edit(EditArgs),
    /// Delete tasks
    Rm(RmArgs),
    /// View or clear the log of failed remote writes
    Failures(FailuresArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Create a project: --project <id> "name" (repeatable)
    #[arg(long, num_args = 2, value_names = ["ID", "NAME"], action = clap::ArgAction::Append)]
    pub project: Vec<String>,
    /// Overwrite an existing taskboard.toml and backend file
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

/// Client-side filters shared by the views
#[derive(Args, Default)]
pub struct FilterArgs {
    /// Case-insensitive text in title or description
    #[arg(long, short = 's')]
    pub search: Option<String>,
    /// Keep these statuses (repeatable)
    #[arg(long)]
    pub status: Vec<String>,
    /// Keep these priorities (repeatable)
    #[arg(long)]
    pub priority: Vec<String>,
    /// Keep tasks with any of these tags (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,
    /// Keep tasks assigned to this user
    #[arg(long)]
    pub assignee: Option<String>,
}

#[derive(Args)]
pub struct BoardArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Lane width in cells
    #[arg(long, default_value_t = 28)]
    pub width: usize,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Sort by due-date, priority, status or title (default: last used, then config)
    #[arg(long)]
    pub sort: Option<String>,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
    /// Sort ascending (overrides a remembered descending sort)
    #[arg(long, conflicts_with = "desc")]
    pub asc: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern
    pub pattern: String,
}

#[derive(Args)]
pub struct CalendarArgs {
    /// Month as YYYY-MM (default: this month)
    pub month: Option<String>,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct GanttArgs {
    /// First visible day, YYYY-MM-DD (default: earliest task start)
    #[arg(long)]
    pub from: Option<String>,
    /// Last visible day, YYYY-MM-DD (default: latest task end)
    #[arg(long)]
    pub to: Option<String>,
    /// exact or basic (default: config)
    #[arg(long)]
    pub palette: Option<String>,
    /// Reference date for delays, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub today: Option<String>,
    /// Chart width in cells
    #[arg(long, default_value_t = 40)]
    pub width: usize,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct DelayedArgs {
    /// Reference date, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub today: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    #[arg(long, short = 'd')]
    pub description: Option<String>,
    /// todo, in-progress or done
    #[arg(long)]
    pub status: Option<String>,
    /// low, medium or high
    #[arg(long)]
    pub priority: Option<String>,
    /// Start date, YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,
    /// End (due) date, YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
    /// Tag (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    /// Estimated hours
    #[arg(long)]
    pub estimate: Option<f64>,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Task ID
    pub id: String,
    /// Target lane: todo, in-progress or done
    pub status: String,
    /// Position in the lane, from 0 (default: bottom)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    /// New description; empty clears it
    #[arg(long, short = 'd')]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    /// low, medium, high, or none to clear
    #[arg(long)]
    pub priority: Option<String>,
    /// YYYY-MM-DD; empty clears it
    #[arg(long)]
    pub start: Option<String>,
    /// YYYY-MM-DD; empty clears it
    #[arg(long)]
    pub end: Option<String>,
    /// Replace all tags (repeatable)
    #[arg(long)]
    pub tag: Vec<String>,
    /// Remove all tags
    #[arg(long, conflicts_with = "tag")]
    pub clear_tags: bool,
    /// User id; empty clears it
    #[arg(long)]
    pub assignee: Option<String>,
    /// Estimated hours
    #[arg(long)]
    pub estimate: Option<f64>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct FailuresArgs {
    /// Show at most this many entries
    #[arg(long)]
    pub limit: Option<usize>,
    /// Delete the log
    #[arg(long)]
    pub clear: bool,
}
