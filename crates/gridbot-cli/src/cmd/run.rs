use crate::output::print_json;
use anyhow::Context;
use gridbot_core::{
    config::Config, db::RobotDb, executor::process_actions, parser::parse_commands,
};
use gridbot_server::state::AppState;
use std::path::Path;
use std::sync::Arc;

fn open(db_path: &Path) -> anyhow::Result<RobotDb> {
    RobotDb::open(db_path).with_context(|| format!("failed to open {}", db_path.display()))
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

/// Run the HTTP API, and unless `no_worker` is set, the periodic driver.
pub fn serve(
    db_path: &Path,
    config: Config,
    port: Option<u16>,
    no_worker: bool,
) -> anyhow::Result<()> {
    config.ensure_valid()?;
    let port = port.unwrap_or(config.server.port);
    let state = AppState::new(open(db_path)?, config);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        println!(
            "gridbot API on http://localhost:{}",
            listener.local_addr()?.port()
        );

        tokio::select! {
            res = gridbot_server::serve_on(state, listener, !no_worker) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}

// ---------------------------------------------------------------------------
// worker
// ---------------------------------------------------------------------------

/// Run only the periodic driver.
pub fn worker(db_path: &Path, config: Config) -> anyhow::Result<()> {
    config.ensure_valid()?;
    let db = Arc::new(open(db_path)?);
    let driver = gridbot_server::worker::Driver::new(
        db,
        config.robot.clone(),
        config.worker.interval(),
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        tokio::select! {
            _ = driver.run() => {},
            _ = tokio::signal::ctrl_c() => {},
        }
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// tick
// ---------------------------------------------------------------------------

/// One parse pass followed by one process pass, in this process.
///
/// A parse error does not stop the process pass, matching how the two jobs
/// run independently under the driver, but it still fails the command.
pub fn tick(db_path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    config.ensure_valid()?;
    let db = open(db_path)?;

    let parsed = parse_commands(&db);
    let processed = process_actions(&db, &config.robot).context("process pass failed")?;

    if json {
        let parse_value = match &parsed {
            Ok(report) => serde_json::to_value(report)?,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        print_json(&serde_json::json!({
            "parse": parse_value,
            "process": processed,
        }))?;
    } else {
        match &parsed {
            Ok(report) => println!(
                "parse:   {} command(s) -> {} action(s)",
                report.commands_parsed, report.actions_created
            ),
            Err(e) => println!("parse:   stopped: {e}"),
        }
        println!(
            "process: {} completed, {} failed, {} action(s) and {} command(s) withdrawn",
            processed.completed,
            usize::from(processed.failed.is_some()),
            processed.withdrawn_actions,
            processed.withdrawn_commands
        );
    }

    parsed.context("parse pass stopped")?;
    Ok(())
}
