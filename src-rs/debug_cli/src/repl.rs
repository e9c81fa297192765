use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::client::HTTPClient;
use crate::models::{AutomationSubmit, CLIConfig, Listing, ReportEntry, ResearchSubmit, Selection};
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
    last_listing: Option<Listing>,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self {
            config,
            client,
            last_listing: None,
        }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.research(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "research" => {
                if rest.is_empty() {
                    render::error("usage: /research <query>");
                } else {
                    self.research(rest);
                }
            }
            "automate" => {
                if rest.is_empty() {
                    render::error("usage: /automate <command>");
                } else {
                    self.automate(rest);
                }
            }
            "status" => match category(rest) {
                Some(cat) => match self.client.view(cat, 0) {
                    Ok(view) => render::view(&view),
                    Err(err) => render::error(&err),
                },
                None => render::error("usage: /status research|automation"),
            },
            "watch" => match category(rest) {
                Some(cat) => self.watch(cat),
                None => render::error("usage: /watch research|automation"),
            },
            "cancel" => match category(rest) {
                Some(cat) => match self.client.cancel(cat) {
                    Ok(resp) if resp.cancel_requested => render::info(&format!(
                        "cancel requested ({})",
                        resp.state.unwrap_or_default()
                    )),
                    Ok(_) => render::info("nothing to cancel"),
                    Err(err) => render::error(&err),
                },
                None => render::error("usage: /cancel research|automation"),
            },
            "reports" => {
                let path = if rest.is_empty() { "." } else { rest };
                match self.client.list_reports(path) {
                    Ok(listing) => self.show_listing(listing),
                    Err(err) => render::error(&err),
                }
            }
            "open" => {
                if rest.is_empty() {
                    render::error("usage: /open <path|name>");
                } else {
                    self.open(rest);
                }
            }
            "download" => {
                let mut args = rest.split_whitespace();
                match args.next() {
                    Some(path) => self.download(path, args.next()),
                    None => render::error("usage: /download <path> [destination]"),
                }
            }
            "suggest" => {
                let goal = if rest.is_empty() { None } else { Some(rest) };
                match self.client.suggestions(goal) {
                    Ok(items) => render::suggestions(&items),
                    Err(err) => render::error(&err),
                }
            }
            "delete" => {
                if rest.is_empty() {
                    render::error("usage: /delete <path>");
                } else {
                    match self.client.delete_report(rest) {
                        Ok(listing) => self.show_listing(listing),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "project" => set_optional(&mut self.config.project_name, rest, "project"),
            "model" => set_optional(&mut self.config.model, rest, "model"),
            "mode" => set_optional(&mut self.config.mode, rest, "mode"),
            "config" => render::config(&self.config),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    self.config.base_url = rest.to_string();
                    self.rebuild_client();
                    render::info("base url updated");
                }
            }
            "token" => {
                if rest.is_empty() {
                    self.config.token = None;
                    render::info("token cleared");
                } else {
                    self.config.token = Some(rest.to_string());
                    render::info("token updated");
                }
                self.rebuild_client();
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn show_listing(&mut self, listing: Listing) {
        render::listing(&listing);
        self.last_listing = Some(listing);
    }

    fn find_entry(&self, target: &str) -> Option<ReportEntry> {
        self.last_listing
            .as_ref()?
            .entries
            .iter()
            .find(|entry| entry.path == target || entry.name == target)
            .cloned()
    }

    /// Entries of the last listing open through the browser; anything else is
    /// fetched as a file.
    fn open(&mut self, target: &str) {
        let Some(entry) = self.find_entry(target) else {
            match self.client.open_report(target) {
                Ok(content) => render::info(&content),
                Err(err) => render::error(&err),
            }
            return;
        };
        match self.client.open_entry(&entry) {
            Ok(Selection::Listing(listing)) => self.show_listing(listing),
            Ok(preview) => render::selection(&preview),
            Err(err) => render::error(&err),
        }
    }

    fn download(&self, path: &str, destination: Option<&str>) {
        let bytes = match self.client.download(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                render::error(&err);
                return;
            }
        };
        let fallback = path.rsplit('/').next().unwrap_or(path);
        let target = destination.unwrap_or(fallback);
        match fs::write(Path::new(target), &bytes) {
            Ok(()) => render::info(&format!("saved {} bytes to {}", bytes.len(), target)),
            Err(err) => render::error(&err.to_string()),
        }
    }

    fn rebuild_client(&mut self) {
        match HTTPClient::new(&self.config.base_url, self.config.token.clone()) {
            Ok(client) => self.client = client,
            Err(err) => render::error(&err),
        }
    }

    fn research(&mut self, query: &str) {
        let body = ResearchSubmit {
            query: query.to_string(),
            project_name: self.config.project_name.clone(),
            model: self.config.model.clone(),
            mode: self.config.mode.clone(),
        };
        match self.client.submit("research", &body) {
            Ok(resp) => {
                render::info(&format!("{} job {} {}", resp.category, resp.task_id, resp.state));
                self.watch("research");
            }
            Err(err) => render::error(&err),
        }
    }

    fn automate(&mut self, command: &str) {
        let body = AutomationSubmit {
            command: command.to_string(),
            mode: self.config.mode.clone(),
        };
        match self.client.submit("automation", &body) {
            Ok(resp) => {
                render::info(&format!("{} job {} {}", resp.category, resp.task_id, resp.state));
                self.watch("automation");
            }
            Err(err) => render::error(&err),
        }
    }

    /// Follows the job, printing only log lines not seen yet.
    fn watch(&self, category: &str) {
        let mut offset = 0;
        let mut last_percent = None;
        loop {
            let view = match self.client.view(category, offset) {
                Ok(view) => view,
                Err(err) => {
                    render::error(&err);
                    return;
                }
            };
            render::log_lines(&view.log);
            offset = view.next_log_offset;
            if let Some(summary) = &view.summary {
                if last_percent != Some(summary.percent) || !view.log.is_empty() {
                    render::progress(summary);
                    last_percent = Some(summary.percent);
                }
            }
            if view.is_terminal() {
                match &view.outcome {
                    Some(done) => render::outcome(done),
                    None => render::info(&format!("finished: {}", view.state)),
                }
                return;
            }
            thread::sleep(Duration::from_millis(self.config.watch_interval_ms.max(100)));
        }
    }
}

fn category(value: &str) -> Option<&'static str> {
    match value.to_lowercase().as_str() {
        "research" | "r" => Some("research"),
        "automation" | "automate" | "a" => Some("automation"),
        _ => None,
    }
}

fn set_optional(slot: &mut Option<String>, value: &str, name: &str) {
    if value.is_empty() {
        render::info(&format!("{}: {}", name, slot.clone().unwrap_or_default()));
    } else {
        *slot = Some(value.to_string());
        render::info(&format!("{} updated", name));
    }
}
