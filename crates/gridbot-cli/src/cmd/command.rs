use crate::output::{print_json, print_table};
use anyhow::Context;
use gridbot_core::{command::Command, db::RobotDb};
use std::path::Path;
use uuid::Uuid;

fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("'{raw}' is not a command id"))
}

fn open(db_path: &Path) -> anyhow::Result<RobotDb> {
    RobotDb::open(db_path).with_context(|| format!("failed to open {}", db_path.display()))
}

// ---------------------------------------------------------------------------
// submit
// ---------------------------------------------------------------------------

pub fn submit(db_path: &Path, text: &str, json: bool) -> anyhow::Result<()> {
    Command::validate_text(text)?;
    let db = open(db_path)?;
    let command = Command::new(text);
    db.insert_command(&command).context("failed to queue command")?;

    if json {
        print_json(&serde_json::json!({ "id": command.id }))?;
    } else {
        println!("Queued command {}", command.id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

pub fn show(db_path: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let db = open(db_path)?;
    let command = db.get_command(id)?;
    let actions = db.actions_for_command(id)?;

    if json {
        #[derive(serde::Serialize)]
        struct ShowOutput<'a> {
            #[serde(flatten)]
            command: &'a Command,
            actions: &'a [gridbot_core::action::Action],
        }
        return print_json(&ShowOutput {
            command: &command,
            actions: &actions,
        });
    }

    println!("Command:  {}", command.id);
    println!("Text:     {}", command.text);
    println!("Status:   {}", command.status);
    println!("Created:  {}", command.created_at.format("%Y-%m-%d %H:%M:%S"));
    if actions.is_empty() {
        println!("\nNo actions.");
        return Ok(());
    }
    println!();

    let rows: Vec<Vec<String>> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let pose = a
                .pose()
                .map(|p| format!("({}, {}) {}", p.x, p.y, p.direction))
                .unwrap_or_else(|| "-".to_string());
            vec![
                (i + 1).to_string(),
                a.code.to_string(),
                a.status.to_string(),
                pose,
            ]
        })
        .collect();
    print_table(&["#", "CODE", "STATUS", "POSE"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// forget
// ---------------------------------------------------------------------------

pub fn forget(db_path: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let db = open(db_path)?;
    let removed = db.delete_command(id)?;

    if json {
        print_json(&serde_json::json!({ "id": id, "actions_removed": removed }))?;
    } else {
        println!("Deleted command {id} and {removed} action(s)");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub fn status(
    db_path: &Path,
    robot: &gridbot_core::config::RobotConfig,
    json: bool,
) -> anyhow::Result<()> {
    let db = open(db_path)?;
    let status = gridbot_core::status::current_status(&db, robot)?;

    if json {
        return print_json(&status);
    }

    println!("Position:  ({}, {})", status.x, status.y);
    println!("Facing:    {}", status.direction);
    println!("Status:    {}", status.status);
    match status.command_id {
        Some(id) => println!("Command:   {id}"),
        None => println!("Command:   -"),
    }
    Ok(())
}
