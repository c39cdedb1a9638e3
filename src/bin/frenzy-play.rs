//! Terminal client: play alone, or join a multiplayer match through the relay.
//!
//! Usage: `frenzy-play [single | multi [MATCH_ID]]`. The server is read from
//! `FRENZY_SERVER_URL` (default `http://127.0.0.1:8080`). After each match the
//! player can start another one or quit.

use std::{env, sync::Arc};

use anyhow::{Context, bail};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashcard_frenzy::{
    client::{
        ClientError, EventEffect, HttpResultSink, MatchClient, MatchView, PersistenceError,
        Verdict, WsTransport, controller::generate_match_id,
    },
    config::AppConfig,
    dto::validation::validate_match_id,
    state::match_session::GameMode,
};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
const QUIT_COMMAND: &str = "/quit";
const USAGE: &str = "usage: frenzy-play [single | multi [MATCH_ID]]";

enum Mode {
    Single,
    Multi { match_id: String },
}

/// One thing that happened while waiting for the player.
enum Input {
    Line(Option<String>),
    Event(Result<EventEffect, ClientError>),
}

/// How a match session ended.
enum Ending {
    /// Game over or channel lost; offer another match.
    Menu,
    /// The player quit or stdin closed.
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut mode = parse_mode(env::args().skip(1).collect())?;
    let config = AppConfig::load();
    let server_url = env::var("FRENZY_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.into());
    let sink = Arc::new(HttpResultSink::new(&server_url).context("building result client")?);
    let mut lines = spawn_stdin_reader();

    loop {
        let client = match mode {
            Mode::Single => MatchClient::single(config.questions().to_vec(), sink.clone())?,
            Mode::Multi { match_id } => {
                let transport = Arc::new(WsTransport::new(&server_url));
                match MatchClient::join_multi(&match_id, config.questions().to_vec(), transport, sink.clone())
                    .await
                {
                    Ok(client) => client,
                    Err(err) => {
                        println!("! could not join match `{match_id}`: {err}");
                        match choose_next_mode(&mut lines).await {
                            Some(next) => {
                                mode = next;
                                continue;
                            }
                            None => break,
                        }
                    }
                }
            }
        };

        if let Ending::Quit = play(client, &mut lines).await {
            break;
        }
        match choose_next_mode(&mut lines).await {
            Some(next) => mode = next,
            None => break,
        }
    }

    Ok(())
}

/// Run one match until it is over, the channel is lost or the player quits.
async fn play(mut client: MatchClient, lines: &mut mpsc::Receiver<String>) -> Ending {
    let view = client.view();
    println!("Match {} - you are {}", view.match_id, view.player);
    if view.mode == GameMode::Multi {
        println!("Share the match id with other players. Type {QUIT_COMMAND} to leave.");
    }
    render_question(&view);

    let ending = loop {
        if client.view().finished {
            print_game_over(&client.view());
            break Ending::Menu;
        }

        let input = if client.view().mode == GameMode::Multi {
            tokio::select! {
                line = lines.recv() => Input::Line(line),
                effect = client.process_next_event() => Input::Event(effect),
            }
        } else {
            Input::Line(lines.recv().await)
        };

        match input {
            Input::Line(None) => break Ending::Quit,
            Input::Line(Some(line)) if line.trim() == QUIT_COMMAND => break Ending::Quit,
            Input::Line(Some(line)) => {
                let outcome = client.submit_answer(&line).await;
                match outcome.verdict {
                    Verdict::Correct => println!("Correct!"),
                    Verdict::Wrong => println!("Wrong, try again."),
                    Verdict::NoQuestion => println!("The match is over."),
                }
                if let Some(Err(err)) = &outcome.publish {
                    println!("! could not reach the other players: {err}");
                }
                match &outcome.persistence {
                    Some(Ok(())) => println!("Result saved."),
                    Some(Err(PersistenceError::Conflict { .. })) => {
                        println!("! this match id was already played with other questions")
                    }
                    Some(Err(err)) => println!("! could not save the result: {err}"),
                    None => {}
                }
                if !outcome.view.finished && outcome.verdict == Verdict::Correct {
                    render_question(&outcome.view);
                }
            }
            Input::Event(Ok(EventEffect::Advanced { finished, .. })) => {
                println!("Another player answered first.");
                if !finished {
                    render_question(&client.view());
                }
            }
            Input::Event(Ok(EventEffect::SnapshotApplied { changed: true })) => {
                println!("Caught up with the match.");
                render_question(&client.view());
            }
            Input::Event(Ok(_)) => {}
            Input::Event(Err(err)) => {
                println!("! lost the match channel: {err}");
                break Ending::Menu;
            }
        }
    };

    client.leave().await;
    ending
}

/// Back to the menu: read lines until a mode is picked or the player quits.
async fn choose_next_mode(lines: &mut mpsc::Receiver<String>) -> Option<Mode> {
    loop {
        println!("\nPlay again: `single`, `multi [MATCH_ID]` or {QUIT_COMMAND}");
        let line = lines.recv().await?;
        if line.trim() == QUIT_COMMAND {
            return None;
        }
        match parse_mode(line.split_whitespace().map(str::to_string).collect()) {
            Ok(mode) => return Some(mode),
            Err(err) => println!("! {err}"),
        }
    }
}

fn parse_mode(args: Vec<String>) -> anyhow::Result<Mode> {
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["single"] => Ok(Mode::Single),
        ["multi"] => Ok(Mode::Multi {
            match_id: generate_match_id(),
        }),
        ["multi", match_id] => {
            validate_match_id(match_id).context("invalid match id")?;
            Ok(Mode::Multi {
                match_id: match_id.to_string(),
            })
        }
        _ => bail!(USAGE),
    }
}

/// Forward stdin lines so they can be awaited next to channel events.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

fn render_question(view: &MatchView) {
    if let Some(question) = &view.question {
        println!(
            "\n[{}/{}] {}   (your score: {})",
            view.question_number, view.total_questions, question.prompt, view.score
        );
    }
}

fn print_game_over(view: &MatchView) {
    println!("\nGame over! Your score: {}", view.score);
    for (player, score) in &view.scoreboard {
        let marker = if *player == view.player { " (you)" } else { "" };
        println!("  {player}{marker}: {score}");
    }
}

/// Keep logs quiet so they do not interleave with the prompt.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
