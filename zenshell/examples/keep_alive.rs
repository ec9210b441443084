//! Keep-alive example: keep the shell open and end it from a callback
//!
//! The session runs its initial commands, then stays open waiting for
//! more. A long running command is queued with a Notice handler that
//! prints every progress update and ends the session once the command
//! has finished.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example keep_alive -- --host localhost --user test --password test
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use zenshell::{Notice, SessionBuilder, SessionEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .keep_alive(true)
        .idle_timeout(Duration::from_secs(args.idle))
        .command("echo $(pwd)")
        .command("echo test");

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let (session, mut events) = builder.connect()?;

    let ender = session.clone();
    session.exec_with(args.command.clone(), move |notice: &Notice| {
        println!("{} [{}]\n{}", notice.command, notice.status, notice.output);
        if notice.status.is_terminal() {
            ender.end();
        }
    });

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::CommandComplete(notice) => {
                println!("finished {:?} with {}", notice.command, notice.status);
            }
            SessionEvent::CommandTimeout(notice) => {
                println!("{:?} timed out after {:?}", notice.command, notice.elapsed);
            }
            SessionEvent::End(notices) => {
                println!("\nSession log:");
                for (command, notice) in notices.by_command() {
                    println!("  {:<20} {}", command, notice.status);
                }
            }
            SessionEvent::Error {
                error, category, ..
            } => eprintln!("{} error: {}", category, error),
            _ => {}
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    command: String,
    idle: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut command = "top -b -n 3".to_string();
        let mut idle = 5u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--command" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        command = args[i].clone();
                    }
                }
                "--idle" => {
                    i += 1;
                    if i < args.len() {
                        idle = args[i].parse().unwrap_or(5);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            command,
            idle,
        }
    }

    fn print_help() {
        println!(
            r#"zenshell keep_alive example

USAGE:
    cargo run --example keep_alive -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -c, --command <CMD>      Command to watch [default: top -b -n 3]
    --idle <SECS>            Idle timeout per command [default: 5]
    --help                   Print this help message
"#
        );
    }
}
