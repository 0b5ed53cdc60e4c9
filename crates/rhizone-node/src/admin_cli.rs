//! rhizone-admin CLI tool
//!
//! Operator commands for a running rhizone-node.
//!
//! Usage:
//!   rhizone-admin stats [--full]
//!   rhizone-admin lineage <member>
//!   rhizone-admin progeny <member> [--all]
//!   rhizone-admin skip <member>
//!   rhizone-admin clear-suspension
//!   rhizone-admin activity <member>
//!   rhizone-admin join <member> [name]
//!   rhizone-admin add-member <member> <name> [--bot]
//!   rhizone-admin tick
//!   rhizone-admin ping

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    Stats { detail: &'static str },
    Lineage { member: u64 },
    Progeny { member: u64, include_inactive: bool },
    Skip { requester: u64 },
    ClearSuspension,
    Activity { member: u64 },
    Join { member: u64, name: Option<String> },
    AddMember { member: u64, name: String, bot: bool },
    Tick,
    Ping,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Data { data: serde_json::Value },
    Bool { value: bool },
    Pong,
}

fn print_usage() {
    eprintln!("rhizone-admin - Operate a Rhizone node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  rhizone-admin stats [--full]                 Succession state (and lottery standings)");
    eprintln!("  rhizone-admin lineage <member>               Who admitted whom, up to the root");
    eprintln!("  rhizone-admin progeny <member> [--all]       Members admitted through a line");
    eprintln!("  rhizone-admin skip <member>                  Custodian passes on the token");
    eprintln!("  rhizone-admin clear-suspension               Resume automatic succession");
    eprintln!("  rhizone-admin activity <member>              Record member activity");
    eprintln!("  rhizone-admin join <member> [name]           A new member joined");
    eprintln!("  rhizone-admin add-member <member> <name> [--bot]  Register an existing member");
    eprintln!("  rhizone-admin tick                           Run an audit pass now");
    eprintln!("  rhizone-admin ping                           Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RHIZONE_SOCKET  Path to admin socket (default: ./rhizone-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("RHIZONE_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./rhizone-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to rhizone-node at {:?}: {}\n\
             Is the rhizone-node running?",
            socket_path, e
        )
    })?;

    // Send command
    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    // Read response
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn member_arg(args: &[String], index: usize, command: &str) -> u64 {
    let Some(raw) = args.get(index) else {
        fail(&format!("{} requires a member argument", command));
    };
    raw.trim()
        .parse()
        .unwrap_or_else(|_| fail(&format!("invalid member id '{}'", raw)))
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(2).any(|a| a == flag)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "stats" => AdminCommand::Stats {
            detail: if has_flag(&args, "--full") {
                "full"
            } else {
                "summary"
            },
        },
        "lineage" => AdminCommand::Lineage {
            member: member_arg(&args, 2, "lineage"),
        },
        "progeny" => AdminCommand::Progeny {
            member: member_arg(&args, 2, "progeny"),
            include_inactive: has_flag(&args, "--all"),
        },
        "skip" => AdminCommand::Skip {
            requester: member_arg(&args, 2, "skip"),
        },
        "clear-suspension" => AdminCommand::ClearSuspension,
        "activity" => AdminCommand::Activity {
            member: member_arg(&args, 2, "activity"),
        },
        "join" => AdminCommand::Join {
            member: member_arg(&args, 2, "join"),
            name: args.get(3).cloned(),
        },
        "add-member" => {
            let member = member_arg(&args, 2, "add-member");
            let Some(name) = args.get(3).filter(|n| !n.starts_with("--")) else {
                fail("add-member requires a name argument");
            };
            AdminCommand::AddMember {
                member,
                name: name.clone(),
                bot: has_flag(&args, "--bot"),
            }
        }
        "tick" => AdminCommand::Tick,
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::Data { data } => match serde_json::to_string_pretty(&data) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("{}", data),
            },
            AdminResponse::Bool { value } => {
                println!("{}", value);
            }
            AdminResponse::Pong => {
                println!("pong - rhizone-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
