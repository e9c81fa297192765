use std::io::{self, Write};

use crate::models::{CLIConfig, Eta, Listing, LogLine, Outcome, Selection, Suggestion, Summary, TaskView};

pub fn banner(cfg: &CLIConfig) {
    println!("Research Monitor CLI");
    println!("Gateway: {}", cfg.base_url);
    println!("Type /help for commands. Plain text starts a research job.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("  /research <query>      Start a research job and watch it");
    println!("  /automate <command>    Start an automation job and watch it");
    println!("  /status <category>     Show the current job of a category");
    println!("  /watch <category>      Follow a job until it finishes");
    println!("  /cancel <category>     Cancel the running job");
    println!("  /reports [path]        List a report folder");
    println!("  /open <path|name>      Open an entry of the last listing, or print a file");
    println!("  /download <path> [to]  Save a report file locally");
    println!("  /suggest [goal]        Suggest automation commands");
    println!("  /delete <path>         Delete a report file or folder");
    println!("  /project [name]        Set project name for research jobs");
    println!("  /model [name]          Set model for research jobs");
    println!("  /mode [name]           Set job mode");
    println!("  /config                Show current config");
    println!("  /base <url>            Update gateway URL");
    println!("  /token <token>         Update bearer token");
}

/// Seconds as `m:ss`.
pub fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn eta(eta: &Eta) -> String {
    match eta {
        Eta::Calculating => "calculating".to_string(),
        Eta::Remaining(secs) => clock(*secs),
        Eta::Completed => "done".to_string(),
    }
}

pub fn progress(summary: &Summary) {
    println!(
        "  [{:>3}%] {}  elapsed {}  eta {}  results {}  success {}%",
        summary.percent,
        summary.status,
        clock(summary.elapsed_seconds),
        eta(&summary.eta),
        summary.result_count,
        summary.success_ratio_percent
    );
}

pub fn log_lines(lines: &[LogLine]) {
    for line in lines {
        if line.substep.is_empty() {
            println!("  {} {}", line.timestamp, line.description);
        } else {
            println!("  {} {} ({})", line.timestamp, line.description, line.substep);
        }
    }
}

pub fn outcome(outcome: &Outcome) {
    let forced = if outcome.forced { " (forced)" } else { "" };
    println!("finished: {}{}", outcome.state, forced);
    if let Some(err) = &outcome.error {
        println!("error: {}", err);
    }
    if let Some(result) = &outcome.result {
        println!("{}", result);
    }
}

pub fn view(view: &TaskView) {
    println!("{} job {} [{}]", view.category, view.task_id, view.state);
    if let Some(summary) = &view.summary {
        progress(summary);
        if !summary.latest_log_description.is_empty() {
            println!("  latest: {}", summary.latest_log_description);
        }
    }
    if let Some(err) = &view.last_poll_error {
        println!("  last poll error: {}", err);
    }
    if let Some(done) = &view.outcome {
        outcome(done);
    }
}

pub fn listing(listing: &Listing) {
    println!("{}", listing.path);
    if let Some(parent) = &listing.parent_path {
        println!("  ..  ({})", parent);
    }
    if listing.entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &listing.entries {
        let marker = if entry.kind == "folder" { "/" } else { "" };
        println!("  {}{}  {}", entry.name, marker, entry.path);
    }
}

pub fn selection(selection: &Selection) {
    match selection {
        Selection::Listing(found) => listing(found),
        Selection::Preview(content) => println!("{}", content),
    }
}

pub fn suggestions(items: &[Suggestion]) {
    if items.is_empty() {
        println!("no suggestions");
        return;
    }
    for (idx, item) in items.iter().enumerate() {
        println!("{:>2}. [{}] {}", idx + 1, item.category, item.command);
        if !item.description.is_empty() {
            println!("    {}", item.description);
        }
    }
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  project: {}", cfg.project_name.clone().unwrap_or_default());
    println!("  model: {}", cfg.model.clone().unwrap_or_default());
    println!("  mode: {}", cfg.mode.clone().unwrap_or_default());
    println!("  watch: {}ms", cfg.watch_interval_ms);
    println!("  token: {}", if cfg.token.is_some() { "set" } else { "none" });
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
