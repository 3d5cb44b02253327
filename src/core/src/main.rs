use clap::{Parser, Subcommand};
use log::{error, info};
use loginwatch::configuration::{Config, ConfigOverrides};
use loginwatch::ingestion::ingest_file;
use loginwatch::reporting::{ReportBuilder, SvgRenderer};
use loginwatch::storage::query::{query, QueryRequest};
use loginwatch::web_interface::WebServer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loginwatch")]
#[command(version)]
#[command(about = "Login session history: ingestion, queries and concurrency reports")]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Flatten a nested JSON sample file into the store
    Ingest { input: PathBuf },
    /// Print records matching NAME=VALUE predicates (host, time, user, program)
    Query {
        #[arg(value_parser = parse_predicate)]
        predicates: Vec<(String, String)>,
        /// Only print this field of each record
        #[arg(long)]
        restrict: Option<String>,
        /// Sort field, `time` by default
        #[arg(long)]
        sort: Option<String>,
    },
    /// Render per-host, combined and program charts
    Report,
    /// Serve the read-only HTTP interface
    Serve,
}

fn parse_predicate(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

fn fail(message: String) -> ! {
    error!("{}", message);
    std::process::exit(1);
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
    .and_then(|c| c.apply(&args.overrides))
    .unwrap_or_else(|e| fail(format!("Unable to load configuration: {}", e)));

    let storage = config
        .open_storage()
        .unwrap_or_else(|e| fail(format!("Unable to open storage: {}", e)));

    match args.command {
        Command::Ingest { input } => {
            let stored = ingest_file(storage.as_ref(), &input)
                .unwrap_or_else(|e| fail(format!("Ingestion failed: {}", e)));
            info!("Stored {} record(s) from {}", stored, input.display());
        }
        Command::Query {
            predicates,
            restrict,
            sort,
        } => {
            let request = QueryRequest {
                predicates,
                restrict,
                sort,
            };
            let result = query(storage.as_ref(), &request)
                .unwrap_or_else(|e| fail(format!("Query failed: {}", e)));
            info!("{} match(es)", result.len());
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => fail(format!("Unable to print results: {}", e)),
            }
        }
        Command::Report => {
            let mut renderer = SvgRenderer::new(&config.report.output_dir)
                .unwrap_or_else(|e| fail(format!("Unable to prepare output dir: {}", e)));
            let summary = ReportBuilder::new(storage.as_ref())
                .run(&mut renderer, config.report.on_failure)
                .unwrap_or_else(|e| fail(format!("Report failed: {}", e)));
            for path in &summary.written {
                info!("Wrote {}", path.display());
            }
            for (target, reason) in &summary.skipped {
                error!("Skipped {}: {}", target, reason);
            }
        }
        Command::Serve => {
            let addr = config
                .web_address()
                .unwrap_or_else(|e| fail(format!("Invalid web address: {}", e)));
            let runtime = tokio::runtime::Runtime::new()
                .unwrap_or_else(|e| fail(format!("Unable to start runtime: {}", e)));
            let server = WebServer::new(storage.clone());
            if let Err(e) = runtime.block_on(server.start(addr)) {
                fail(format!("Web server stopped: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predicate() {
        assert_eq!(
            parse_predicate("time=01/02/20 10:00:00"),
            Ok(("time".to_string(), "01/02/20 10:00:00".to_string()))
        );
        assert!(parse_predicate("host").is_err());
    }

    #[test]
    fn test_query_args() {
        let args = Args::try_parse_from([
            "loginwatch",
            "query",
            "host=unix",
            "user=alice",
            "--restrict",
            "program",
        ])
        .unwrap_or_else(|e| panic!("{}", e));
        match args.command {
            Command::Query {
                predicates,
                restrict,
                sort,
            } => {
                assert_eq!(predicates.len(), 2);
                assert_eq!(predicates[0], ("host".to_string(), "unix".to_string()));
                assert_eq!(restrict.as_deref(), Some("program"));
                assert!(sort.is_none());
            }
            _ => panic!("expected query command"),
        }
    }
}
