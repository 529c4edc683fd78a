mod aggregate;
mod filters;
mod ipc;
mod marks;
mod records;
mod source;
mod view;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Line-delimited JSON sidecar for the school dashboard's filter and analytics core.
#[derive(Parser, Debug)]
#[command(name = "schoold", version)]
struct Args {
    /// Fixture folder to select at startup.
    #[arg(long, env = "SCHOOLD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter directives, written to stderr.
    #[arg(long, env = "SCHOOLD_LOG", default_value = "schoold=info")]
    log: String,
}

fn main() {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("schoold=info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let mut state = ipc::AppState::default();
    if let Some(path) = &args.workspace {
        if let Err(e) = ipc::preselect_workspace(&mut state, path) {
            tracing::warn!(path = %path.display(), error = %e, "startup workspace not selected");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::debug!("stdin closed, exiting");
}
