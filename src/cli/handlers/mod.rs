mod init;
pub use init::cmd_init;

use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::NaiveDate;
use futures::future::join_all;
use regex::RegexBuilder;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::failure_log::{self, FailureEntry};
use crate::io::file_remote::FileRemote;
use crate::io::project_io::{self, BoardError};
use crate::io::state::{self, ViewState};
use crate::model::config::BoardConfig;
use crate::model::project::Project;
use crate::model::task::{Priority, ProjectId, Task, TaskId, TaskPatch, TaskStatus};
use crate::ops::filter::{FilterCriteria, MatchField, pattern_matches};
use crate::ops::gateway::{MutationHandle, MutationIntent, MutationOutcome, ReconciliationPolicy};
use crate::ops::interact::{BoardController, TaskDraft};
use crate::ops::remote::RemoteTaskApi;
use crate::parse::dates::parse_date;
use crate::parse::wire::{normalize_priority, normalize_status};
use crate::util::unicode::truncate_to_width;
use crate::view::board::project_board;
use crate::view::calendar::{Month, project_month};
use crate::view::delay::delayed_tasks;
use crate::view::gantt::{DelayPalette, GanttOptions, GanttRange, project_gantt};
use crate::view::list::{SortKey, SortSpec};

type CmdResult = Result<(), Box<dyn Error>>;

/// Flags that apply to every command
struct Globals {
    board_dir: Option<String>,
    project: Option<u64>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let globals = Globals {
        board_dir: cli.board_dir,
        project: cli.project,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(args, globals.board_dir.as_deref()),
        Commands::Projects => cmd_projects(&globals, json),

        // Read commands
        Commands::Board(args) => cmd_board(args, &globals, json),
        Commands::List(args) => cmd_list(args, &globals, json),
        Commands::Search(args) => cmd_search(args, &globals, json),
        Commands::Calendar(args) => cmd_calendar(args, &globals, json),
        Commands::Gantt(args) => cmd_gantt(args, &globals, json),
        Commands::Delayed(args) => cmd_delayed(args, &globals, json),

        // Write commands
        Commands::Add(args) => cmd_add(args, &globals, json),
        Commands::Move(args) => cmd_move(args, &globals, json),
        Commands::Edit(args) => cmd_edit(args, &globals, json),
        Commands::Rm(args) => cmd_rm(args, &globals, json),

        // Maintenance
        Commands::Failures(args) => cmd_failures(args, &globals, json),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn board_root(globals: &Globals) -> Result<PathBuf, Box<dyn Error>> {
    let start = match &globals.board_dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir().map_err(BoardError::IoError)?,
    };
    Ok(project_io::discover_board(&start)?)
}

/// Everything a command needs about the board it runs against
struct Session {
    root: PathBuf,
    config: BoardConfig,
    state: ViewState,
    remote: Rc<FileRemote>,
    projects: Vec<Project>,
    project: ProjectId,
}

impl Session {
    fn open(globals: &Globals) -> Result<Session, Box<dyn Error>> {
        let root = board_root(globals)?;
        let config = project_io::read_config(&root)?;
        let state = state::read_view_state(&root).unwrap_or_default();
        let remote = Rc::new(FileRemote::from_config(&root, &config.remote));
        let projects = remote.projects()?;
        let project = select_project(globals.project, &state, &projects)?;
        tracing::debug!(root = %root.display(), project = %project, "session opened");
        Ok(Session {
            root,
            config,
            state,
            remote,
            projects,
            project,
        })
    }

    fn controller(&self) -> BoardController {
        let remote: Rc<dyn RemoteTaskApi> = self.remote.clone();
        let policy = ReconciliationPolicy {
            on_failure: self.config.sync.on_failure,
        };
        let controller = BoardController::new(remote, policy);
        controller.set_order(self.state.order_for(self.project));
        controller
    }

    /// Fetch the selected project's tasks into `controller`'s store.
    fn load(&self, controller: &BoardController) -> Result<Vec<Task>, Box<dyn Error>> {
        run_local(controller.load_project(self.project))??;
        Ok(controller.snapshot())
    }

    /// Remember the project (and the lane order, when a controller is given).
    /// Failure to save only warns.
    fn save_state(&mut self, controller: Option<&BoardController>) {
        self.state.project = Some(self.project);
        if let Some(controller) = controller {
            self.state.set_order(self.project, controller.order());
        }
        if let Err(e) = state::write_view_state(&self.root, &self.state) {
            tracing::warn!(error = %e, "could not save view state");
        }
    }
}

/// `-p`, else the last project used, else the first one the backend lists
fn select_project(
    explicit: Option<u64>,
    state: &ViewState,
    projects: &[Project],
) -> Result<ProjectId, String> {
    let known = |id: ProjectId| projects.iter().any(|p| p.id == id);
    if let Some(id) = explicit {
        let id = ProjectId(id);
        return if known(id) {
            Ok(id)
        } else {
            Err(format!("no project with id {}", id))
        };
    }
    if let Some(id) = state.project
        && known(id)
    {
        return Ok(id);
    }
    projects
        .first()
        .map(|p| p.id)
        .ok_or_else(|| "the backend has no projects (create one with `tb init --project`)".to_string())
}

/// Run `fut` on a single-threaded runtime, where the gateway's remote calls
/// live.
fn run_local<F: Future>(fut: F) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    Ok(local.block_on(&rt, fut))
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    raw.parse::<TaskStatus>()
        .ok()
        .or_else(|| normalize_status(raw))
        .ok_or_else(|| format!("unknown status '{}' (expected todo, in-progress or done)", raw))
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    raw.parse::<Priority>()
        .ok()
        .or_else(|| normalize_priority(raw))
        .ok_or_else(|| format!("unknown priority '{}' (expected low, medium or high)", raw))
}

/// Validated date flag, normalized to `YYYY-MM-DD`
fn parse_date_arg(raw: &str, flag: &str) -> Result<String, String> {
    parse_date(raw)
        .map(|d| d.to_string())
        .ok_or_else(|| format!("invalid date for --{}: '{}' (expected YYYY-MM-DD)", flag, raw))
}

/// Ids on the command line always name backend tasks; placeholders never
/// outlive the command that minted them.
fn task_id_arg(raw: &str) -> TaskId {
    TaskId::server(raw.trim())
}

fn today_arg(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw {
        Some(s) => parse_date(s).ok_or_else(|| format!("invalid date for --today: '{}'", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn criteria_from(args: &FilterArgs) -> Result<FilterCriteria, String> {
    Ok(FilterCriteria {
        query: args.search.clone(),
        pattern: None,
        statuses: args
            .status
            .iter()
            .map(|s| parse_status(s))
            .collect::<Result<_, _>>()?,
        priorities: args
            .priority
            .iter()
            .map(|p| parse_priority(p))
            .collect::<Result<_, _>>()?,
        tags: args.tag.clone(),
        assignee: args.assignee.clone(),
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn warn_skipped(skipped: &[crate::parse::dates::ProjectionInputError]) {
    for line in format_skipped(skipped) {
        eprintln!("warning: {}", line);
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_projects(globals: &Globals, json: bool) -> CmdResult {
    let root = board_root(globals)?;
    let config = project_io::read_config(&root)?;
    let projects = FileRemote::from_config(&root, &config.remote).projects()?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("(no projects)");
    }
    for project in &projects {
        println!("{}", format_project_line(project));
    }
    Ok(())
}

fn cmd_board(args: BoardArgs, globals: &Globals, json: bool) -> CmdResult {
    let mut session = Session::open(globals)?;
    let criteria = criteria_from(&args.filter)?;
    let controller = session.controller();
    let tasks = session.load(&controller)?;
    let order = controller.order();
    let view = project_board(criteria.apply(&tasks), &order);

    if json {
        print_json(&view)?;
    } else {
        for line in format_board(&view, &session.projects, args.width) {
            println!("{}", line);
        }
    }
    session.save_state(None);
    Ok(())
}

fn list_sort(args: &ListArgs, session: &Session) -> Result<SortSpec, String> {
    let list = &session.config.list;
    let base = session
        .state
        .sort
        .unwrap_or_else(|| SortSpec::new(list.sort, list.descending));
    let key = match &args.sort {
        Some(raw) => raw.parse::<SortKey>()?,
        None => base.key,
    };
    let descending = args.desc || (!args.asc && base.descending());
    Ok(SortSpec::new(key, descending))
}

fn cmd_list(args: ListArgs, globals: &Globals, json: bool) -> CmdResult {
    let mut session = Session::open(globals)?;
    let sort = list_sort(&args, &session)?;
    let mut controller = session.controller();
    session.load(&controller)?;
    controller.set_criteria(criteria_from(&args.filter)?);
    controller.set_sort(sort);
    let visible = controller.visible();

    if json {
        print_json(&visible)?;
    } else if visible.is_empty() {
        println!("(no tasks)");
    } else {
        let rows: Vec<&Task> = visible.iter().collect();
        for line in format_list(&rows) {
            println!("{}", line);
        }
    }
    session.state.sort = Some(sort);
    session.save_state(None);
    Ok(())
}

fn match_field_name(field: MatchField) -> &'static str {
    match field {
        MatchField::Id => "id",
        MatchField::Title => "title",
        MatchField::Description => "description",
        MatchField::Tag => "tag",
    }
}

#[derive(serde::Serialize)]
struct SearchHitJson<'a> {
    #[serde(flatten)]
    task: &'a Task,
    matched: Vec<&'static str>,
}

fn cmd_search(args: SearchArgs, globals: &Globals, json: bool) -> CmdResult {
    let re = RegexBuilder::new(&args.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("invalid regex: {}", e))?;
    let mut session = Session::open(globals)?;
    let controller = session.controller();
    let tasks = session.load(&controller)?;

    let hits: Vec<(&Task, Vec<MatchField>)> = tasks
        .iter()
        .filter_map(|t| {
            let fields: Vec<MatchField> = pattern_matches(&re, t).into_iter().map(|m| m.field).collect();
            (!fields.is_empty()).then_some((t, fields))
        })
        .collect();

    if json {
        let out: Vec<SearchHitJson> = hits
            .iter()
            .map(|(task, fields)| SearchHitJson {
                task: *task,
                matched: fields.iter().map(|f| match_field_name(*f)).collect(),
            })
            .collect();
        print_json(&out)?;
    } else if hits.is_empty() {
        println!("(no matches)");
    } else {
        for (task, fields) in &hits {
            println!("{}", format_task_line(task));
            if fields.contains(&MatchField::Description)
                && let Some(desc) = &task.description
            {
                let first = desc.lines().find(|l| re.is_match(l)).unwrap_or(desc.as_str());
                println!("    {}", truncate_to_width(first.trim(), 72));
            }
        }
    }

    session.state.record_search(&args.pattern);
    session.save_state(None);
    Ok(())
}

fn cmd_calendar(args: CalendarArgs, globals: &Globals, json: bool) -> CmdResult {
    let month = match &args.month {
        Some(raw) => raw.parse::<Month>()?,
        None => Month::of(chrono::Local::now().date_naive()),
    };
    let criteria = criteria_from(&args.filter)?;
    let mut session = Session::open(globals)?;
    let controller = session.controller();
    let tasks = session.load(&controller)?;
    let view = project_month(criteria.apply(&tasks), month);

    warn_skipped(&view.skipped);
    if json {
        print_json(&view)?;
    } else {
        for line in format_calendar(&view) {
            println!("{}", line);
        }
    }
    session.save_state(None);
    Ok(())
}

fn parse_palette(raw: &str) -> Result<DelayPalette, String> {
    match raw.trim().to_lowercase().as_str() {
        "exact" => Ok(DelayPalette::Exact),
        "basic" => Ok(DelayPalette::Basic),
        _ => Err(format!("unknown palette '{}' (expected exact or basic)", raw)),
    }
}

fn cmd_gantt(args: GanttArgs, globals: &Globals, json: bool) -> CmdResult {
    let today = today_arg(args.today.as_deref())?;
    let from = args
        .from
        .as_deref()
        .map(|s| parse_date(s).ok_or_else(|| format!("invalid date for --from: '{}'", s)))
        .transpose()?;
    let to = args
        .to
        .as_deref()
        .map(|s| parse_date(s).ok_or_else(|| format!("invalid date for --to: '{}'", s)))
        .transpose()?;
    let criteria = criteria_from(&args.filter)?;

    let mut session = Session::open(globals)?;
    let mut options = GanttOptions::from_config(&session.config.gantt, today);
    if let Some(raw) = &args.palette {
        options.palette = parse_palette(raw)?;
    }
    let controller = session.controller();
    let tasks = session.load(&controller)?;
    let visible = criteria.apply(&tasks);

    let whole_months = session.config.gantt.whole_months;
    let fitted = GanttRange::fit(visible.iter().copied())
        .map(|r| if whole_months { r.whole_months() } else { r });
    let start = from.or(fitted.map(|r| r.start));
    let end = to.or(fitted.map(|r| r.end));
    let (Some(start), Some(end)) = (start, end) else {
        println!("(no dated tasks; pass --from and --to to pick a range)");
        session.save_state(None);
        return Ok(());
    };
    let range = GanttRange::new(start, end).ok_or("--to is before --from")?;
    let chart = project_gantt(visible, range, &options);

    warn_skipped(&chart.skipped);
    if json {
        print_json(&chart)?;
    } else {
        for line in format_gantt(&chart, args.width) {
            println!("{}", line);
        }
    }
    session.save_state(None);
    Ok(())
}

fn cmd_delayed(args: DelayedArgs, globals: &Globals, json: bool) -> CmdResult {
    let today = today_arg(args.today.as_deref())?;
    let mut session = Session::open(globals)?;
    let controller = session.controller();
    let tasks = session.load(&controller)?;
    let (late, skipped) = delayed_tasks(&tasks, today);

    warn_skipped(&skipped);
    if json {
        let out: Vec<DelayedJson> = late
            .iter()
            .map(|(task, delay)| DelayedJson {
                task: *task,
                delay: *delay,
            })
            .collect();
        print_json(&out)?;
    } else {
        for line in format_delayed(&late) {
            println!("{}", line);
        }
    }
    session.save_state(None);
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn action_name(intent: &MutationIntent) -> &'static str {
    match intent {
        MutationIntent::Create(_) => "create",
        MutationIntent::Update(_) => "update",
        MutationIntent::Delete(_) => "delete",
    }
}

type Settled = Vec<(MutationIntent, MutationOutcome)>;

/// Wait for every handle. Must run on the same `LocalSet` the mutations were
/// started on.
async fn settle(handles: Vec<MutationHandle>) -> Result<Settled, Box<dyn Error>> {
    let intents: Vec<MutationIntent> = handles.iter().map(|h| h.intent().clone()).collect();
    let settled = join_all(handles.into_iter().map(MutationHandle::settled)).await;
    let outcomes = settled.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(intents.into_iter().zip(outcomes).collect())
}

/// Log remote failures with the local copy, then print what happened to each
/// mutation.
fn report(session: &mut Session, controller: &BoardController, settled: Settled, json: bool) -> CmdResult {
    let failures = controller.failures();
    if !failures.is_empty() {
        let store = controller.store().borrow();
        let entries: Vec<FailureEntry> = failures
            .iter()
            .map(|f| FailureEntry::new(f, store.get(f.intent.target())))
            .collect();
        failure_log::log_failures(&session.root, &entries);
    }

    let mut rows = Vec::new();
    for (intent, outcome) in &settled {
        let task = match outcome {
            MutationOutcome::Reconciled(Some(task)) => Some(task.clone()),
            _ => controller.store().borrow().get(intent.target()).cloned(),
        };
        if let Some(err) = outcome.error() {
            eprintln!(
                "warning: {} {} was not saved to the backend: {} (logged to {})",
                action_name(intent),
                intent.target(),
                err,
                failure_log::failure_log_path(&session.root).display()
            );
        }
        rows.push(MutationJson {
            action: action_name(intent),
            outcome: outcome_name(outcome),
            task,
            error: outcome.error().map(|e| e.to_string()),
        });
    }

    if json {
        print_json(&rows)?;
    } else {
        for ((intent, _), row) in settled.iter().zip(&rows) {
            match (intent, &row.task) {
                (MutationIntent::Delete(id), _) => println!("deleted {}", id),
                (_, Some(task)) => println!("{}", format_task_line(task)),
                (_, None) => println!("{} {}", row.outcome, intent.target()),
            }
        }
    }

    session.save_state(Some(controller));
    Ok(())
}

fn cmd_add(args: AddArgs, globals: &Globals, json: bool) -> CmdResult {
    let draft = TaskDraft {
        title: args.title,
        description: args.description,
        status: args.status.as_deref().map(parse_status).transpose()?,
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
        start_date: args.start.as_deref().map(|s| parse_date_arg(s, "start")).transpose()?,
        end_date: args.end.as_deref().map(|s| parse_date_arg(s, "end")).transpose()?,
        assigned_to: args.assignee,
        tags: args.tag,
        estimated_time: args.estimate,
    };

    let mut session = Session::open(globals)?;
    let project = session.project;
    let controller = session.controller();
    let settled = run_local(async {
        controller.load_project(project).await?;
        let handle = controller.create_task(draft)?;
        settle(vec![handle]).await
    })??;
    report(&mut session, &controller, settled, json)
}

fn cmd_move(args: MoveArgs, globals: &Globals, json: bool) -> CmdResult {
    let id = task_id_arg(&args.id);
    let status = parse_status(&args.status)?;

    let mut session = Session::open(globals)?;
    let project = session.project;
    let controller = session.controller();
    let settled = run_local(async {
        controller.load_project(project).await?;
        match controller.drop_into_lane(&id, status, args.index)? {
            Some(handle) => settle(vec![handle]).await.map(Some),
            None => Ok(None),
        }
    })??;

    match settled {
        Some(settled) => report(&mut session, &controller, settled, json),
        None => {
            if json {
                print_json(&controller.store().borrow().get(&id))?;
            } else {
                println!("reordered {} within {}", id, status);
            }
            session.save_state(Some(&controller));
            Ok(())
        }
    }
}

/// An empty value clears the field
fn clearable(raw: Option<String>) -> Option<Option<String>> {
    raw.map(|s| if s.trim().is_empty() { None } else { Some(s) })
}

fn clearable_date(raw: Option<String>, flag: &str) -> Result<Option<Option<String>>, String> {
    match clearable(raw) {
        Some(Some(s)) => Ok(Some(Some(parse_date_arg(&s, flag)?))),
        other => Ok(other),
    }
}

fn patch_from(args: EditArgs) -> Result<TaskPatch, String> {
    let priority = match args.priority.as_deref() {
        None => None,
        Some(p) if p.eq_ignore_ascii_case("none") || p.trim().is_empty() => Some(None),
        Some(p) => Some(Some(parse_priority(p)?)),
    };
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if !args.tag.is_empty() {
        Some(args.tag)
    } else {
        None
    };
    Ok(TaskPatch {
        title: args.title,
        description: clearable(args.description),
        status: args.status.as_deref().map(parse_status).transpose()?,
        priority,
        start_date: clearable_date(args.start, "start")?,
        end_date: clearable_date(args.end, "end")?,
        assigned_to: clearable(args.assignee),
        tags,
        estimated_time: args.estimate.map(Some),
    })
}

fn cmd_edit(args: EditArgs, globals: &Globals, json: bool) -> CmdResult {
    let id = task_id_arg(&args.id);
    let patch = patch_from(args)?;
    if patch.is_empty() {
        return Err("nothing to change (pass at least one field flag)".into());
    }

    let mut session = Session::open(globals)?;
    let project = session.project;
    let controller = session.controller();
    let settled = run_local(async {
        controller.load_project(project).await?;
        let handle = controller.edit_task(&id, patch)?;
        settle(vec![handle]).await
    })??;
    report(&mut session, &controller, settled, json)
}

fn cmd_rm(args: RmArgs, globals: &Globals, json: bool) -> CmdResult {
    let mut ids: Vec<TaskId> = Vec::with_capacity(args.ids.len());
    for id in args.ids.iter().map(|s| task_id_arg(s)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let mut session = Session::open(globals)?;
    let project = session.project;
    let controller = session.controller();
    let settled = run_local(async {
        controller.load_project(project).await?;
        // Every id is checked before anything is deleted
        if let Some(missing) = ids.iter().find(|id| controller.store().borrow().get(id).is_none()) {
            return Err(format!("task not found: {}", missing).into());
        }
        let handles = ids
            .iter()
            .map(|id| controller.delete_task(id))
            .collect::<Result<Vec<_>, _>>()?;
        settle(handles).await
    })??;
    report(&mut session, &controller, settled, json)
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn cmd_failures(args: FailuresArgs, globals: &Globals, json: bool) -> CmdResult {
    let root = board_root(globals)?;
    if args.clear {
        let count = failure_log::clear_failures(&root)?;
        println!("cleared {} failure log entr{}", count, if count == 1 { "y" } else { "ies" });
        return Ok(());
    }

    let entries = failure_log::read_failures(&root, args.limit);
    if json {
        let out: Vec<FailureJson> = entries.iter().map(failure_to_json).collect();
        return print_json(&out);
    }
    if entries.is_empty() {
        println!("(no failed writes)");
    }
    for entry in &entries {
        println!("{}", format_failure_entry(entry));
    }
    Ok(())
}
