// tb: CLI for talking to taskboard-daemon
//
// Commands:
//   tb ping
//   tb boards [--project <id>]
//   tb board <board_id>
//   tb active [--session <name>]
//   tb request <type> [<json payload>]
//   tb watch <board_id>

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use std::env;
use taskboard_lib::daemon::{Config, DaemonClient};

fn print_help() {
    println!(
        r#"tb - CLI for the taskboard daemon

USAGE:
    tb <COMMAND> [OPTIONS]

COMMANDS:
    ping                       Check that the daemon is up
    boards                     List boards
    board <board_id>           Show one board
    active                     Show the board for the current session
    request <type> [json]      Send a raw request and print the response data
    watch <board_id>           Stream notifications for a board

OPTIONS:
    --project, -p <id>         Filter boards by project
    --session, -s <name>       Session to resolve the active board for
    --socket <path>            Daemon socket (default from TASKBOARD_DAEMON_DIR)
    --help, -h                 Show this help

EXAMPLES:
    tb request add_task '{{"board_id":"web/default","task":{{"title":"Ship it"}}}}'
    tb watch web/default"#
    );
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let command = args[1].as_str();

    // Parse options, collecting positionals
    let mut project: Option<String> = None;
    let mut session: Option<String> = None;
    let mut socket: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--project" | "-p" => {
                i += 1;
                project = Some(args.get(i).cloned().ok_or_else(|| anyhow!("--project needs a value"))?);
            }
            "--session" | "-s" => {
                i += 1;
                session = Some(args.get(i).cloned().ok_or_else(|| anyhow!("--session needs a value"))?);
            }
            "--socket" => {
                i += 1;
                socket = Some(args.get(i).cloned().ok_or_else(|| anyhow!("--socket needs a value"))?);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let client = match socket {
        Some(path) => DaemonClient::new(std::path::Path::new(&path)),
        None => DaemonClient::from_config(&Config::from_env()),
    };

    match command {
        "ping" => {
            client.ping()?;
            println!("pong");
        }
        "boards" => {
            let payload = project.map(|p| json!({ "project_id": p }));
            print_json(&client.call("list_boards", payload)?)?;
        }
        "board" => {
            let Some(board_id) = positional.first() else {
                bail!("Usage: tb board <board_id>");
            };
            print_json(&client.call("get_board", Some(json!({ "board_id": board_id })))?)?;
        }
        "active" => {
            let payload = session.map(|s| json!({ "session_name": s }));
            print_json(&client.call("get_active_board", payload)?)?;
        }
        "request" => {
            let Some(kind) = positional.first() else {
                bail!("Usage: tb request <type> [json]");
            };
            let payload = positional
                .get(1)
                .map(|raw| serde_json::from_str::<Value>(raw))
                .transpose()
                .context("Payload must be valid JSON")?;
            print_json(&client.call(kind, payload)?)?;
        }
        "watch" => {
            let Some(board_id) = positional.first() else {
                bail!("Usage: tb watch <board_id>");
            };
            eprintln!("Watching {board_id} (Ctrl-C to stop)");
            for notification in client.subscribe(board_id)? {
                println!("{}", serde_json::to_string(&notification?)?);
            }
            eprintln!("Daemon closed the stream");
        }
        "help" => print_help(),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }

    Ok(())
}
