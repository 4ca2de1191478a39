use anyhow::Context;
use clap::{Parser, Subcommand};
use memomatch_core::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod player;
mod settings;

use player::Player;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Where progress is saved between sessions
    #[arg(long, global = true, default_value = "memomatch-save.json")]
    save_file: PathBuf,

    /// TOML file with game and animation settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a game with a simulated player
    Play(PlayArgs),
    /// Show the saved progress
    Stats,
    /// Forget the saved game, keeping the best score
    Reset,
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    #[arg(short, long, default_value_t = 4)]
    rows: Count,

    #[arg(short, long, default_value_t = 4)]
    columns: Count,

    /// Force a seed instead of the configured one
    #[arg(short, long)]
    seed: Option<u64>,

    /// Chance the player remembers a face it has seen, from 0 to 1
    #[arg(short, long, default_value_t = 0.8)]
    memory: f64,

    /// Stop after this many attempts and save, to be resumed later
    #[arg(short, long)]
    turns: Option<usize>,

    /// Ignore any saved game
    #[arg(long)]
    new: bool,
}

fn init_logging(verbose: &clap_verbosity_flag::Verbosity) {
    let level = verbose.log_level_filter().as_str().to_ascii_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_progress(path: &Path) -> anyhow::Result<ProgressStore<JsonFileStore>> {
    let store = JsonFileStore::open(path)
        .with_context(|| format!("Could not open save file {}", path.display()))?;
    log::debug!("Progress kept in {}", store.path().display());
    Ok(ProgressStore::new(store))
}

/// Resumes the saved game, or deals a new one when the save holds an already finished game.
fn deal<S: KeyValueStore>(
    engine: &mut MatchEngine<S>,
    layout: GridLayout,
) -> anyhow::Result<Vec<CardId>> {
    let dealt = engine.resume_or_start(layout)?;
    if !engine.phase().is_final() {
        return Ok(dealt);
    }
    println!("Saved game was already finished, starting a new one");
    Ok(engine.restart_game()?)
}

fn play(args: PlayArgs, settings: Settings, save_file: &Path) -> anyhow::Result<()> {
    let mut config = settings.game;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.new {
        config.load_save_on_start = false;
    }
    let layout = GridLayout::new(args.rows, args.columns)?;

    let mut score = ScoreTracker::from_config(&config);
    score.subscribe(|snapshot: ScoreSnapshot| {
        println!(
            "score {:>5}  matches {:>3}  attempts {:>3}",
            snapshot.current_score, snapshot.matches_found, snapshot.total_attempts
        );
    });
    let audio = |event: GameEvent| log::debug!("sound {}", event.sound_name());
    let mut engine = MatchEngine::new(
        config.clone(),
        score,
        open_progress(save_file)?,
        TimedPresenter::new(settings.animations),
        audio,
    )?;

    let dealt = deal(&mut engine, layout)?;
    log::info!(
        "Dealt {} cards on a {}x{} grid",
        dealt.len(),
        layout.rows(),
        layout.columns()
    );
    for (index, id) in dealt.iter().enumerate() {
        let (row, column) = layout.position_of(index);
        log::debug!("Card {} at row {}, column {}", id, row, column);
    }
    engine.advance(config.preview_ms);

    let mut player = Player::new(config.seed, args.memory);
    let mut turns = 0;
    while !engine.phase().is_final() {
        if args.turns.is_some_and(|limit| turns >= limit) {
            engine.suspend();
            println!("Paused after {} attempts, progress saved", turns);
            return Ok(());
        }
        if !player.take_turn(&mut engine) {
            // remaining cards still animating
            engine.advance(100);
            continue;
        }
        turns += 1;
        engine.run_until_idle();
    }

    let snapshot = engine.snapshot();
    println!(
        "Game over: {} pairs, {} attempts, score {} (best {}), {:.1}s of play",
        snapshot.total_pairs,
        snapshot.score.total_attempts,
        snapshot.score.current_score,
        engine.progress().best_score()?,
        snapshot.now as f64 / 1000.0
    );
    engine.shutdown();
    Ok(())
}

fn stats(save_file: &Path) -> anyhow::Result<()> {
    let progress = open_progress(save_file)?;
    let saved = progress.load_progress()?;
    if progress.has_save() {
        println!(
            "Saved game: score {}, {} matches, {} attempts",
            saved.score, saved.matches_found, saved.total_attempts
        );
    } else {
        println!("No saved game");
    }
    println!("Best score: {}", saved.best_score);
    if let Some(played) = progress.last_played()? {
        println!("Last played: {}", played.to_rfc2822());
    }
    Ok(())
}

fn reset(save_file: &Path) -> anyhow::Result<()> {
    let mut progress = open_progress(save_file)?;
    progress.clear_save()?;
    println!("Saved game cleared");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.verbose);

    let settings = Settings::load(args.config.as_deref())?;
    match args.command {
        Command::Play(play_args) => play(play_args, settings, &args.save_file),
        Command::Stats => stats(&args.save_file),
        Command::Reset => reset(&args.save_file),
    }
}
