// CGI entry point: one request per process.
use std::io::{self, Write};
use anyhow::Context;
use clap::Parser;
use wavefetch::config::ServerConfig;
use wavefetch::request::QueryParams;
use wavefetch::service;
use wavefetch::store::{CalibrationTable, DirectoryStore};
#[derive(Parser, Debug)]
#[command(name = "wavefetch")]
#[command(about = "Serves one signal database request as JSON", long_about = None)]
struct Cli {
    /// Query string to serve instead of QUERY_STRING
    query: Option<String>,
}
fn init_logging(config: &ServerConfig) {
    // stdout carries the reply, so logs go to stderr
    env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .target(env_logger::Target::Stderr)
        .init();
}
fn load_calibration(config: &ServerConfig) -> CalibrationTable {
    let Some(path) = config.calibration_path() else {
        return CalibrationTable::default();
    };
    match CalibrationTable::load(&path) {
        Ok(table) => table,
        Err(err) => {
            log::warn!("continuing without calibration: {err}");
            CalibrationTable::default()
        }
    }
}
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load().context("loading configuration")?;
    init_logging(&config);
    // A query on the command line is for interactive debugging.
    let query = match cli.query {
        Some(query) => query,
        None => std::env::var("QUERY_STRING").unwrap_or_default(),
    };
    let params = QueryParams::parse(&query);
    let store = DirectoryStore::new(&config.database_root, load_calibration(&config));
    log::debug!("serving {query:?} from {}", store.root().display());
    let reply = service::handle(&store, &params, &config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "Content-Type: application/json\r\n\r\n")?;
    if let Some(body) = reply {
        serde_json::to_writer(&mut out, &body).context("writing reply")?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
