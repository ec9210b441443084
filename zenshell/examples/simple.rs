//! Simple example: run a fixed list of commands and print the results
//!
//! The session connects, runs every configured command in order, exits
//! the shell and reports all Notices at once in the `End` event.
//!
//! # Usage
//!
//! With password authentication:
//! ```bash
//! cargo run --example simple -- --host localhost --user test --password test
//! ```
//!
//! With SSH key authentication:
//! ```bash
//! cargo run --example simple -- --host localhost --user test --key ~/.ssh/id_ed25519
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use zenshell::{SessionBuilder, SessionEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout))
        .verbose(args.verbose)
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

    let (_session, mut events) = builder.connect()?;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connect => println!("Connected!"),
            SessionEvent::Ready => println!("Shell ready"),
            SessionEvent::End(notices) => {
                println!("\n{}", "-".repeat(50));
                for notice in &notices {
                    println!(
                        "$ {}  [{} in {:?}]",
                        notice.command, notice.status, notice.elapsed
                    );
                    println!("{}", notice.output);
                }
                println!("{}", "-".repeat(50));
            }
            SessionEvent::Error {
                error, category, ..
            } => eprintln!("{} error: {}", category, error),
            SessionEvent::Close { had_error } => {
                println!("Closed{}", if had_error { " with error" } else { "" });
            }
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
    timeout: u64,
    verbose: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut timeout = 30u64;
        let mut verbose = false;

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
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--verbose" | "-v" => verbose = true,
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
            timeout,
            verbose,
        }
    }

    fn print_help() {
        println!(
            r#"zenshell simple example

USAGE:
    cargo run --example simple -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -t, --timeout <SECS>     Connection timeout [default: 30]
    -v, --verbose            Log each command at info level
    --help                   Print this help message
"#
        );
    }
}
