//! Interactive REPL.

use crate::commands::format_greeting;
use colored::Colorize;
use framewire_client::Client;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

const HELP_TEXT: &str = r#"
Available commands:
  help                     Show this help
  ping                     Ping the server
  hello <name> [body...]   Greet the server

  quit, exit               Exit the REPL
"#;

pub async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
    let addr = client.connection().config().addr;
    println!("{}", "framewire CLI".bold().cyan());
    println!("Connecting to {}...", addr);

    client.connect_and_listen().await?;
    println!("{}", "Connected!".green());

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".framewire_history"))
        .unwrap_or_else(|_| ".framewire_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "framewire>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&client, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }

                if !client.is_connected() {
                    println!("{}", "Connection lost.".red());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    client: &Client,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(Some(String::new()));
    }

    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "ping" => {
            let latency = client.ping().await?;
            Ok(Some(format!("{} time={}ms", "PONG".green(), latency.as_millis())))
        }

        "hello" | "h" => {
            if args.is_empty() {
                return Ok(Some("Usage: hello <name> [body...]".to_string()));
            }
            let body = if args.len() > 1 {
                args[1..].join(" ")
            } else {
                "hello".to_string()
            };
            let response = client.hello(args[0], body).await?;
            Ok(Some(format_greeting(response.body.as_deref())))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}
