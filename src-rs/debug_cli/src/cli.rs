use std::env;

use crate::models::CLIConfig;

const DEFAULT_URL: &str = "http://localhost:8080";

pub fn parse_config() -> CLIConfig {
    let mut cfg = CLIConfig {
        base_url: env_or("RESEARCH_MONITOR_URL", DEFAULT_URL.to_string()),
        token: env_opt("RESEARCH_MONITOR_CLI_TOKEN"),
        project_name: env_opt("RESEARCH_MONITOR_PROJECT"),
        model: env_opt("RESEARCH_MONITOR_MODEL"),
        mode: None,
        watch_interval_ms: env_u64("RESEARCH_MONITOR_WATCH_MS", 1000),
    };

    let args: Vec<String> = env::args().collect();
    let mut idx = 1;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.base_url = value.clone();
                    idx += 1;
                }
            }
            "--token" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.token = Some(value.clone());
                    idx += 1;
                }
            }
            "--project" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.project_name = Some(value.clone());
                    idx += 1;
                }
            }
            "--model" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.model = Some(value.clone());
                    idx += 1;
                }
            }
            "--watch-ms" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<u64>() {
                        cfg.watch_interval_ms = parsed;
                    }
                    idx += 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    cfg
}

fn env_or(key: &str, fallback: String) -> String {
    env::var(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.parse::<u64>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}
