//! connect4 - Connect Four engine command line
//!
//! Subcommands:
//! 1. `analyze`: answer a JSON move request on stdout
//! 2. `arena`: play two bots against each other
//! 3. `play`: human vs bot in the terminal

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use games_connect4::Outcome;
use tokio::signal;
use tracing::{error, info};

use host::config::{parse_first_player, Cli, Command, EngineArgs};
use host::metrics;
use host::{
    analyze, run_arena, ArenaConfig, GameHost, MoveReply, MoveRequest, SessionError, TurnReport,
};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for JSON replies and the board
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.engine.validate()?;

    init_tracing(&cli.engine.log_level)?;
    info!(log_level = %cli.engine.log_level, "Tracing initialized");

    metrics::init_metrics();

    let result = match cli.command.clone() {
        Command::Analyze { input } => run_analyze(cli.engine.clone(), input).await,
        Command::Arena {
            challenger,
            opponent,
            games,
            concurrency,
            metrics,
        } => {
            run_arena_command(
                &cli.engine,
                &challenger,
                &opponent,
                games,
                concurrency,
                metrics,
            )
            .await
        }
        Command::Play {
            first,
            max_sessions,
            session_idle_secs,
        } => run_play(&cli.engine, &first, max_sessions, session_idle_secs).await,
    };

    if let Err(e) = &result {
        error!("connect4 failed: {:#}", e);
    }
    result
}

async fn run_analyze(engine: EngineArgs, input: Option<PathBuf>) -> Result<()> {
    let raw = match &input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };

    let reply = match serde_json::from_str::<MoveRequest>(&raw) {
        Ok(request) => {
            let mut policy = engine.mcts_policy()?;
            tokio::task::spawn_blocking(move || analyze(&request, &mut policy)).await?
        }
        Err(e) => MoveReply::error(format!("Invalid request: {}", e)),
    };

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn run_arena_command(
    engine: &EngineArgs,
    challenger: &str,
    opponent: &str,
    games: u32,
    concurrency: usize,
    print_metrics: bool,
) -> Result<()> {
    let challenger = engine.bot_factory(challenger.parse().map_err(anyhow::Error::msg)?)?;
    let opponent = engine.bot_factory(opponent.parse().map_err(anyhow::Error::msg)?)?;
    let seed = engine.effective_seed().unwrap_or_else(rand::random);

    let config = ArenaConfig {
        games,
        concurrency,
        seed,
    };
    let challenger_name = challenger.kind();
    let opponent_name = opponent.kind();

    let arena = run_arena(challenger, opponent, config);
    let (report, _records) = tokio::select! {
        result = arena => result?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, abandoning arena");
            return Ok(());
        }
    };

    println!(
        "{} vs {}: {} games, {} wins, {} losses, {} draws (score {:.3}, seed {})",
        challenger_name,
        opponent_name,
        report.games,
        report.wins,
        report.losses,
        report.draws,
        report.score(),
        seed
    );
    if report.fallbacks > 0 {
        println!("random fallbacks: {}", report.fallbacks);
    }
    if print_metrics {
        print!("{}", metrics::encode_metrics());
    }
    Ok(())
}

async fn run_play(
    engine: &EngineArgs,
    first: &str,
    max_sessions: usize,
    session_idle_secs: u64,
) -> Result<()> {
    let first = parse_first_player(first)?;
    let kind = engine.bot_kind()?;
    let bot = engine.bot_factory(kind)?.build(engine.effective_seed())?;

    let mut game_host = GameHost::new(bot, max_sessions, Duration::from_secs(session_idle_secs));
    if let Some(seed) = engine.effective_seed() {
        game_host = game_host.with_seed(seed);
    }
    info!(bot = game_host.bot_name(), ?first, "Starting interactive game");

    let game = tokio::task::spawn_blocking(move || play_loop(game_host, first));
    tokio::select! {
        result = game => result?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            // The blocking stdin read cannot be cancelled
            std::process::exit(130);
        }
    }
}

fn play_loop(mut game_host: GameHost, first: host::FirstPlayer) -> Result<()> {
    let report = game_host.start(first)?;
    let id = report.session;
    print_turn(&report);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while !game_host.session(id)?.board().is_terminal() {
        print!("Your move (0-6, q to quit): ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }
        let Ok(column) = input.parse::<u8>() else {
            println!("'{}' is not a column", input);
            continue;
        };

        match game_host.player_move(id, column) {
            Ok(report) => print_turn(&report),
            Err(SessionError::IllegalMove(e)) => println!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let session = game_host.session(id)?;
    if let Some(outcome) = session.board().outcome() {
        let message = match outcome {
            Outcome::Draw => "Draw.".to_string(),
            Outcome::Win(p) if p == session.human_player() => "You win!".to_string(),
            Outcome::Win(p) => format!("{} ({}) wins.", game_host.bot_name(), p),
        };
        println!("{}", message);
    }
    game_host.close(id);
    Ok(())
}

fn print_turn(report: &TurnReport) {
    if let Some(column) = report.bot_move {
        let note = if report.fallback.is_some() {
            " (random fallback)"
        } else {
            ""
        };
        println!("Bot plays {}{}", column, note);
    }
    println!("{}", report.board);
}
