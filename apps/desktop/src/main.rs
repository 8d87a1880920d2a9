use anyhow::Result;
use clap::Parser;
use client_core::{ClientEvent, GameView, MatchClient, Phase};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast,
};
use tracing::warn;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the match server, e.g. http://127.0.0.1:8000
    #[arg(long)]
    server_url: Option<String>,
    /// Player name to register with; prompted for when omitted
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    let server_url = args.server_url.unwrap_or(settings.server_url);
    let preset_name = args.name.or(settings.player_name);

    let client = MatchClient::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let name = match &preset_name {
            Some(name) => name.clone(),
            None => match prompt_line(&mut lines, "Enter your name:").await? {
                Some(line) => line,
                None => return Ok(()),
            },
        };

        // Subscribe before queueing so the first push is never missed.
        let mut events = client.subscribe_events();
        if let Err(err) = client.register_and_queue(&server_url, &name).await {
            eprintln!("Could not start a session: {err}");
            if preset_name.is_some() {
                return Err(err);
            }
            continue;
        }
        println!("Registered as {name}. Waiting for an opponent...");

        if !run_game(&client, &mut events, &mut lines).await? {
            return Ok(());
        }
        println!("Back to the lobby.");
    }
}

/// Drives one game to completion. Returns `false` when the user quit or
/// stdin closed, `true` when the game ended and a new session should start.
async fn run_game(
    client: &MatchClient,
    events: &mut broadcast::Receiver<ClientEvent>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<bool> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::PhaseChanged(Phase::InGame)) => println!("Opponent found!"),
                Ok(ClientEvent::PhaseChanged(_)) => {}
                Ok(ClientEvent::GameUpdated(view)) => render(&view),
                Ok(ClientEvent::GameEnded { reason }) => {
                    println!("Game ended: {reason}");
                    return Ok(true);
                }
                Ok(ClientEvent::Error(message)) => eprintln!("error: {message}"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(false),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(false) };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "q" | "quit" | "exit") {
                    return Ok(false);
                }
                match parse_cell(line) {
                    Some((row, col)) => {
                        if let Err(err) = client.play_cell(row, col).await {
                            eprintln!("{err}");
                        }
                    }
                    None => println!("Enter moves as `<row> <col>` with values 0-2, or `quit`."),
                }
            }
        }
    }
}

fn render(view: &GameView) {
    println!();
    println!("     0   1   2");
    for (row_idx, row) in view.board.0.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell.map_or_else(|| " ".to_string(), |mark| mark.to_string()))
            .collect();
        println!("  {row_idx}  {}", cells.join(" | "));
        if row_idx + 1 < view.board.0.len() {
            println!("    ---+---+---");
        }
    }
    println!("You are playing as {}", view.mark);
    println!("{}", view.status);
    if !view.status.is_terminal() {
        println!("Pick a cell with `<row> <col>`, or `quit`.");
    }
}

fn parse_cell(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((row, col))
}

async fn prompt_line(
    lines: &mut Lines<BufReader<Stdin>>,
    prompt: &str,
) -> Result<Option<String>> {
    println!("{prompt}");
    loop {
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let line = line.trim();
        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_row_and_column() {
        assert_eq!(parse_cell("1 2"), Some((1, 2)));
        assert_eq!(parse_cell("  0   0 "), Some((0, 0)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_cell("one two"), None);
        assert_eq!(parse_cell("1"), None);
        assert_eq!(parse_cell("1 2 3"), None);
    }
}
