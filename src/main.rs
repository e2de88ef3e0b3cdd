//! CreditGraph host process.
//!
//! Reads one JSON request per stdin line and writes one JSON response per
//! stdout line. The graph lives for the lifetime of the process.
//!
//! Usage: `creditgraph [config.json]` (defaults to `~/.creditgraph/config.json`).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use creditgraph_lib::dispatch;
use creditgraph_lib::graph::CreditGraph;
use creditgraph_lib::state::{load_config, load_config_from};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_config_from(&path),
        None => load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    let graph = CreditGraph::new(config);
    log::info!("Credit graph ready; reading requests from stdin");

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read request: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = dispatch::handle_line(&graph, &line);
        let written = serde_json::to_string(&response)
            .map_err(io::Error::other)
            .and_then(|json| writeln!(stdout, "{}", json))
            .and_then(|_| stdout.flush());
        if let Err(e) = written {
            log::error!("Failed to write response: {}", e);
            break;
        }
    }
}
