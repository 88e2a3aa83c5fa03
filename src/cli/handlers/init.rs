use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::commands::InitArgs;
use crate::io::file_remote::FileRemote;
use crate::io::project_io::{self, BoardError, CONFIG_FILE};
use crate::model::project::Project;
use crate::model::task::ProjectId;

const CONFIG_TEMPLATE: &str = r##"# Task board settings. Every key is optional.

[sync]
# What a failed remote write does to the board:
# "keep-optimistic" keeps showing the change, "rollback" undoes it.
on_failure = "keep-optimistic"

[list]
# due-date, priority, status or title
sort = "due-date"
descending = false

[gantt]
# Smallest bar width, as a fraction of the chart
min_bar_width = 0.01
# "exact" greys out late todo bars; "basic" uses status colours only
palette = "exact"
# Widen the fitted date range to whole calendar months
whole_months = false

[remote]
# Backend data file, relative to this directory
file = "tasks.json"
# Reject every write, to try out the failure path
fail_writes = false
"##;

/// Parse --project pairs from the flat Vec<String> produced by clap.
fn parse_project_pairs(args: &[String]) -> Result<Vec<Project>, String> {
    let mut seen = HashSet::new();
    let mut projects = Vec::new();
    for chunk in args.chunks(2) {
        let [id, name] = chunk else {
            continue;
        };
        let id: u64 = id
            .parse()
            .map_err(|_| format!("invalid project id \"{}\": expected a number", id))?;
        if !seen.insert(id) {
            return Err(format!("duplicate project id {}", id));
        }
        if name.trim().is_empty() {
            return Err(format!("project {} needs a name", id));
        }
        projects.push(Project {
            id: ProjectId(id),
            name: name.trim().to_string(),
            description: String::new(),
            start_date: None,
            end_date: None,
        });
    }
    Ok(projects)
}

fn target_dir(board_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match board_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Ok(fs::canonicalize(dir)?)
        }
        None => Ok(std::env::current_dir()?),
    }
}

fn init_board(root: &Path, projects: Vec<Project>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if root.join(CONFIG_FILE).exists() && !force {
        return Err(BoardError::AlreadyExists(root.to_path_buf()).into());
    }
    crate::io::atomic_write(&root.join(CONFIG_FILE), CONFIG_TEMPLATE.as_bytes())?;

    let config = project_io::read_config(root)?;
    let remote = FileRemote::from_config(root, &config.remote);
    if remote.path().exists() && !force {
        return Err(format!(
            "{} already exists (use --force to replace it)",
            remote.path().display()
        )
        .into());
    }
    remote.init(projects)?;
    Ok(())
}

pub fn cmd_init(args: InitArgs, board_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let projects = parse_project_pairs(&args.project)?;
    let root = target_dir(board_dir)?;
    init_board(&root, projects.clone(), args.force)?;

    println!("Initialized task board in {}", root.display());
    for project in &projects {
        println!("  project: {} ({})", project.name, project.id);
    }
    if projects.is_empty() {
        println!("  no projects yet; rerun with --project <id> \"name\" --force to add some");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::BoardConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn template_parses_to_defaults() {
        let config: BoardConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, BoardConfig::default());
    }

    #[test]
    fn project_pairs() {
        let args: Vec<String> = ["7", "CRM", "8", " Site "].iter().map(|s| s.to_string()).collect();
        let projects = parse_project_pairs(&args).unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].id, ProjectId(7));
        assert_eq!(projects[1].name, "Site");

        let bad: Vec<String> = vec!["x".into(), "CRM".into()];
        assert!(parse_project_pairs(&bad).is_err());
        let dup: Vec<String> = ["7", "A", "7", "B"].iter().map(|s| s.to_string()).collect();
        assert!(parse_project_pairs(&dup).is_err());
    }

    #[test]
    fn init_refuses_existing_board_without_force() {
        let dir = TempDir::new().unwrap();
        let projects = parse_project_pairs(&["7".to_string(), "CRM".to_string()]).unwrap();
        init_board(dir.path(), projects.clone(), false).unwrap();
        assert!(dir.path().join("taskboard.toml").is_file());
        assert!(dir.path().join("tasks.json").is_file());

        assert!(init_board(dir.path(), projects.clone(), false).is_err());
        init_board(dir.path(), Vec::new(), true).unwrap();
        let remote = FileRemote::new(dir.path().join("tasks.json"), false);
        assert!(remote.projects().unwrap().is_empty());
    }
}
