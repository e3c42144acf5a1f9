use anyhow::{Context, Result};
use clap::Parser;
use rtsai::{new_match, play, verify_determinism};
use rtsai_core::testing::SAMPLE_CONTENT;
use rtsai_core::{load_content, load_content_file, AiConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Content file with resources, unit types, upgrades and AI types
    /// (the built-in sample when omitted)
    #[arg(long)]
    content: Option<PathBuf>,

    /// AI tuning file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the shared random stream
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Game seconds to simulate
    #[arg(short, long, default_value_t = 300)]
    seconds: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Play the match twice and fail unless both runs agree
    #[arg(long)]
    verify_determinism: bool,

    /// Write the AI save block here when the match ends
    #[arg(long)]
    dump_save: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let content = match &args.content {
        Some(path) => load_content_file(path)
            .with_context(|| format!("failed to load content from {}", path.display()))?,
        None => load_content(SAMPLE_CONTENT).context("built-in sample content is broken")?,
    };
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            AiConfig::from_text(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => AiConfig::default(),
    };
    let cycles = config.seconds(args.seconds);

    if args.verify_determinism {
        log::info!("checking determinism over {} cycles", cycles);
        if !verify_determinism(&content, &config, args.seed, cycles)? {
            anyhow::bail!("runs with seed {} diverged", args.seed);
        }
        println!("deterministic: seed {}, {} seconds", args.seed, args.seconds);
        return Ok(());
    }

    let (mut engine, mut world) = new_match(content, config, args.seed)?;
    let report = play(&mut engine, &mut world, cycles);

    println!(
        "played {} seconds ({} cycles), {} events, {} commands",
        args.seconds,
        report.cycles,
        report.events,
        report.total_commands()
    );
    for (player, kinds) in &report.per_player {
        let line: Vec<String> = kinds.iter().map(|(k, n)| format!("{}={}", k, n)).collect();
        println!("  player {}: {}", player, line.join(" "));
    }
    let metrics = engine.metrics();
    println!(
        "ai time: {:.3} ms/cycle, {} callbacks",
        metrics.cycle_avg_ms(),
        metrics.callbacks
    );

    if let Some(path) = &args.dump_save {
        let text = engine.save().context("failed to serialize AI state")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("AI state written to {}", path.display());
    }

    Ok(())
}
