use std::sync::Arc;

use smarttask::config::AppConfig;
use smarttask::core::collections::CollectionKind;
use smarttask::core::task::{NewTask, Task, TaskId, duration_options};
use smarttask::sync::{HttpTaskClient, ParseDebouncer, Synchronizer};

const USAGE: &str = "usage: smarttask <command> [args]

commands:
  list                    show My Day, Smart Priority, Other and Completed
  complete <id> [min]     complete a task (defaults to the predicted duration)
  delete <id>             delete a task
  myday <id>              add to or remove from My Day
  add <text...>           parse free text and create a task
  show <id>               show one task
  parse <text...>         show what the server predicts for some text
  insights                productivity insight
  schedule                run the smart scheduler
  retrain                 retrain the prediction models";

fn init_logging(config: &AppConfig) {
    // Logs go to the systemd user journal (`journalctl --user -t smarttask -f`).
    // This crate logs at info/debug (per config), everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("smarttask") {
                let max = if smarttask::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    smarttask::set_debug_logging(config.debug_logging);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(j) => j.with_syslog_identifier("smarttask".to_string()),
        Err(e) => {
            eprintln!("journal logging unavailable: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn parse_id(arg: Option<&String>) -> Result<TaskId, String> {
    let raw = arg.ok_or("missing task id")?;
    raw.parse().map_err(|_| format!("not a task id: {}", raw))
}

fn describe(task: &Task) -> String {
    let mut line = format!("[{}] {}", task.id, task.name);
    if let Some(p) = task.predicted_priority {
        line.push_str(&format!("  ({})", p.as_label()));
    }
    if let Some(min) = task.predicted_duration_minutes {
        line.push_str(&format!("  ~{} min", min));
    }
    if let Some(due) = task.due_at {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d %H:%M")));
    }
    if let Some(at) = task.scheduled_at {
        line.push_str(&format!("  scheduled {}", at.format("%a %H:%M")));
    }
    line
}

fn print_section(title: &str, tasks: &[Task]) {
    println!("{}", title);
    if tasks.is_empty() {
        println!("  (none)");
    }
    for task in tasks {
        println!("  {}", describe(task));
    }
    println!();
}

fn print_lists(sync: &Synchronizer) {
    print_section("My Day", &sync.tasks(CollectionKind::MyDay));
    print_section("Smart Priority", &sync.priority_tasks());
    print_section("Other Tasks", &sync.other_tasks());
    print_section("Completed", &sync.tasks(CollectionKind::Completed));
}

fn report_notices(sync: &Synchronizer) {
    for notice in sync.take_notices() {
        eprintln!("! {}", notice.message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    let client = Arc::new(HttpTaskClient::from_config(&config)?);
    let sync = Synchronizer::new(client.clone());
    log::info!("Using task server at {}", client.base_url());

    match command {
        "list" => {
            sync.refresh().await?;
            print_lists(&sync);
        }
        "complete" => {
            let id = parse_id(args.get(1))?;
            sync.refresh().await?;
            let minutes = match args.get(2) {
                Some(raw) => raw.parse::<u32>().map_err(|_| format!("not a duration: {}", raw))?,
                None => {
                    let lists = sync.snapshot();
                    let predicted = [CollectionKind::MyDay, CollectionKind::Pending]
                        .into_iter()
                        .find_map(|kind| lists.find(kind, id))
                        .and_then(|t| t.predicted_duration_minutes);
                    println!("How long did it take? (pass minutes as an argument to override)");
                    for (label, _) in duration_options(predicted) {
                        println!("  {}", label);
                    }
                    predicted.unwrap_or(30)
                }
            };
            let result = sync.complete_task(id, minutes).await;
            report_notices(&sync);
            result?;
            println!("Completed task {} ({} min)", id, minutes);
        }
        "delete" => {
            let id = parse_id(args.get(1))?;
            sync.refresh().await?;
            let result = sync.delete_task(id).await;
            report_notices(&sync);
            result?;
            println!("Deleted task {}", id);
        }
        "myday" => {
            let id = parse_id(args.get(1))?;
            sync.refresh().await?;
            let result = sync.toggle_my_day(id).await;
            report_notices(&sync);
            result?;
            print_lists(&sync);
        }
        "add" | "parse" => {
            let text = args[1..].join(" ");
            let debouncer = ParseDebouncer::new(client.clone(), config.parse_debounce());
            let Some(parsed) = debouncer.submit(&text).await? else {
                return Err("nothing to parse".into());
            };
            println!("Task:     {}", parsed.task_name);
            if let Some(p) = parsed.predicted_priority {
                println!("Priority: {}", p.as_label());
            }
            if let Some(min) = parsed.predicted_time_min {
                println!("Estimate: ~{} min", min);
            }
            if let Some(due) = parsed.due_date {
                println!("Due:      {}", due.format("%Y-%m-%d %H:%M"));
            }
            if command == "add" {
                if parsed.task_name.trim().is_empty() {
                    return Err("please enter a task name".into());
                }
                let task = sync.create_task(&NewTask::from_parsed(&parsed)).await?;
                println!("Created task {}", task.id);
            }
        }
        "show" => {
            let id = parse_id(args.get(1))?;
            let task = sync.task_details(id).await?;
            println!("{}", describe(&task));
            println!("  status:  {:?}", task.status);
            println!("  created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
            if let Some(done) = task.completed_at {
                println!("  done:    {}", done.format("%Y-%m-%d %H:%M"));
            }
        }
        "insights" => {
            let insights = client.insights().await?;
            println!("{}", insights.insight);
            if let Some(summary) = insights.daily_summary {
                let counts = summary.datasets.first().map(|d| d.data.clone()).unwrap_or_default();
                for (label, count) in summary.labels.iter().zip(counts) {
                    println!("  {:<4}{}", label, "#".repeat(count as usize));
                }
            }
        }
        "schedule" => {
            let scheduled = client.smart_schedule().await?;
            print_section("Schedule", &scheduled);
        }
        "retrain" => {
            println!("{}", client.retrain().await?);
        }
        other => {
            eprintln!("unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    sync.close();
    Ok(())
}
