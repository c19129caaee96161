//! `gte` - apply a task file of proposed fixes to a repository

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gte_core::{
    EngineConfig, FixTask, Orchestrator, PatchPipeline, RiskLevel, TaskFile, TaskSelector,
    TaskStatus,
};
use gte_isolation::IsolationManager;
use gte_kernel::Scheduler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let tasks_arg = || {
        Arg::new("tasks")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Task file (.toml, .yaml, .yml or .json)")
    };
    let selection_args = [
        Arg::new("language")
            .long("language")
            .help("Only tasks in this language"),
        Arg::new("rule")
            .long("rule")
            .action(ArgAction::Append)
            .help("Only tasks for this rule id (repeatable)"),
        Arg::new("min-risk")
            .long("min-risk")
            .value_parser(value_parser!(RiskLevel))
            .help("Only tasks at or above this risk level"),
        Arg::new("limit")
            .long("limit")
            .value_parser(value_parser!(usize))
            .help("At most this many tasks, highest priority first"),
    ];
    let repo_arg = Arg::new("repo")
        .long("repo")
        .default_value(".")
        .value_parser(value_parser!(PathBuf))
        .help("Repository path");

    Command::new("gte")
        .version(gte_core::VERSION)
        .about("Governance Task Execution Engine")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (.toml, .yaml, .yml or .json)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Apply, validate and commit every selected task")
                .arg(tasks_arg())
                .args(selection_args.clone())
                .arg(
                    Arg::new("max-parallel")
                        .long("max-parallel")
                        .value_parser(value_parser!(usize))
                        .help("Override orchestrator.max_parallel"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the JSON report here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the batches the selected tasks would run in")
                .arg(tasks_arg())
                .args(selection_args.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("select")
                .about("List the tasks a filter selects")
                .arg(tasks_arg())
                .args(selection_args),
        )
        .subcommand(
            Command::new("merge")
                .about("Merge an isolation branch into a target branch")
                .arg(repo_arg.clone())
                .arg(Arg::new("branch").required(true).help("Branch to merge"))
                .arg(
                    Arg::new("into")
                        .long("into")
                        .default_value("main")
                        .help("Target branch"),
                ),
        )
        .subcommand(
            Command::new("revert")
                .about("Revert a committed fix")
                .arg(repo_arg)
                .arg(Arg::new("commit").required(true).help("Commit to revert"))
                .arg(
                    Arg::new("reason")
                        .long("reason")
                        .default_value("manual revert")
                        .help("Reason recorded in the revert commit"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn selector(args: &ArgMatches) -> TaskSelector {
    let mut selector = TaskSelector::new();
    if let Some(language) = args.get_one::<String>("language") {
        selector = selector.language(language.clone());
    }
    if let Some(rules) = args.get_many::<String>("rule") {
        selector = selector.rule_ids(rules.cloned());
    }
    if let Some(level) = args.get_one::<RiskLevel>("min-risk") {
        selector = selector.min_risk(*level);
    }
    if let Some(limit) = args.get_one::<usize>("limit") {
        selector = selector.limit(*limit);
    }
    selector
}

fn selected_tasks(args: &ArgMatches, config: &EngineConfig) -> Result<Vec<FixTask>> {
    let path = args
        .get_one::<PathBuf>("tasks")
        .context("task file argument is required")?;
    let tasks = TaskFile::from_path(path)
        .with_context(|| format!("loading tasks from {}", path.display()))?
        .with_default_max_retries(config.orchestrator.default_max_retries)
        .into_tasks();
    let selected: Vec<FixTask> = selector(args).select(&tasks).into_iter().cloned().collect();
    tracing::info!(loaded = tasks.len(), selected = selected.len(), "Tasks selected");
    Ok(selected)
}

async fn run(args: &ArgMatches, mut config: EngineConfig) -> Result<i32> {
    if let Some(max_parallel) = args.get_one::<usize>("max-parallel") {
        config.orchestrator.max_parallel = *max_parallel;
        config.validate()?;
    }
    let tasks = selected_tasks(args, &config)?;
    let pipeline = PatchPipeline::from_config(&config)?;

    let mut orchestrator = Orchestrator::new(Arc::new(pipeline), config.orchestrator.clone());
    orchestrator.add_tasks(tasks)?;
    let report = orchestrator.execute().await?;

    let json = serde_json::to_string_pretty(&report)?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }

    for ticket in &report.tickets {
        tracing::warn!(task_id = %ticket.task_id, title = %ticket.title, "Manual review required");
    }
    eprintln!("{}", report.summary());
    Ok(i32::from(report.count(TaskStatus::Failed) > 0))
}

fn plan(args: &ArgMatches, config: &EngineConfig) -> Result<i32> {
    let mut scheduler = Scheduler::new();
    for task in selected_tasks(args, config)? {
        scheduler.add_task(task.id, task.priority, &task.dependencies)?;
    }
    let plan = scheduler.build_plan()?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        for (index, batch) in plan.iter().enumerate() {
            let ids: Vec<&str> = batch.iter().map(|id| id.as_str()).collect();
            println!("batch {}: {}", index + 1, ids.join(", "));
        }
        println!("{} task(s) in {} batch(es)", plan.task_count(), plan.len());
    }
    Ok(0)
}

fn select(args: &ArgMatches, config: &EngineConfig) -> Result<i32> {
    for task in selected_tasks(args, config)? {
        println!(
            "{}\t{}\t{}\t{}",
            task.id,
            task.priority,
            task.issue.risk_level.as_str(),
            task.issue.location()
        );
    }
    Ok(0)
}

fn open_repo(args: &ArgMatches, config: &EngineConfig) -> Result<IsolationManager> {
    let repo = args
        .get_one::<PathBuf>("repo")
        .map_or_else(|| Path::new("."), PathBuf::as_path);
    IsolationManager::open(repo, config.isolation.settings.clone())
        .with_context(|| format!("opening repository {}", repo.display()))
}

fn merge(args: &ArgMatches, config: &EngineConfig) -> Result<i32> {
    let manager = open_repo(args, config)?;
    let branch = args.get_one::<String>("branch").context("branch is required")?;
    let target = args.get_one::<String>("into").context("target is required")?;
    if !manager.merge_to(branch, target) {
        bail!("could not merge {branch} into {target}");
    }
    println!("merged {branch} into {target}");
    Ok(0)
}

fn revert(args: &ArgMatches, config: &EngineConfig) -> Result<i32> {
    let manager = open_repo(args, config)?;
    let commit = args.get_one::<String>("commit").context("commit is required")?;
    let reason = args.get_one::<String>("reason").context("reason is required")?;
    if !manager.revert(commit, reason) {
        bail!("could not revert {commit}");
    }
    println!("reverted {commit}");
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = load_config(&matches)?;
    let code = match matches.subcommand() {
        Some(("run", args)) => run(args, config).await?,
        Some(("plan", args)) => plan(args, &config)?,
        Some(("select", args)) => select(args, &config)?,
        Some(("merge", args)) => merge(args, &config)?,
        Some(("revert", args)) => revert(args, &config)?,
        _ => unreachable!("subcommand_required"),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn selection_flags_build_a_filter() {
        let matches = cli()
            .try_get_matches_from([
                "gte", "select", "tasks.toml", "--rule", "E501", "--rule", "F401", "--min-risk",
                "medium", "--limit", "2",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "select");
        assert_eq!(args.get_one::<RiskLevel>("min-risk"), Some(&RiskLevel::Medium));
        let rules: Vec<&String> = args.get_many::<String>("rule").unwrap().collect();
        assert_eq!(rules, ["E501", "F401"]);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let matches = cli()
            .try_get_matches_from(["gte", "plan", "t.yaml", "--json-logs", "--config", "gte.toml"])
            .unwrap();
        assert!(matches.get_flag("json-logs"));
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("gte.toml"))
        );
    }

    #[test]
    fn bad_risk_level_is_rejected() {
        let result = cli().try_get_matches_from(["gte", "run", "t.toml", "--min-risk", "severe"]);
        assert!(result.is_err());
    }
}
