//! synthfx CLI: real-time player and recipe inspector.
//!
//! # Commands
//!
//! - `synthfx devices` - list output devices
//! - `synthfx inspect` - durations, frame counts and peaks of every effect and cue
//! - `synthfx play <effect>` - trigger an effect (optionally overlapping, optionally faded out)
//! - `synthfx cues` - random lane-safety ticks with move cues
//!
//! Set `RUST_LOG=debug` for engine diagnostics.

use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::unbounded;
use rand::Rng;

use synthfx_core::cues::{render_tick, CueMode, Lane, LaneCueProfile, MoveCueStyle, SafeLanes};
use synthfx_core::profile::EffectKind;
use synthfx_core::render::render;
use synthfx_engine::backend::device::output_device_names;
use synthfx_engine::{
    CpalBackend, EffectEngine, EngineConfig, Health, LaneCueConfig, LaneCueEngine, LaneCuePlayer,
    SoundEffectPlayer, ThreadScheduler,
};

/// Procedural sound effects and lane cues
#[derive(Parser)]
#[command(name = "synthfx")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Global {
    /// Output volume in [0, 1]
    #[arg(long, global = true, default_value_t = 0.8)]
    volume: f32,

    /// Voices per effect pool
    #[arg(long, global = true, default_value_t = 4)]
    voices: usize,

    /// Tail repeats of the `fail` effect
    #[arg(long = "fail-tail", global = true, default_value_t = 6)]
    fail_tail: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// List output devices
    Devices,

    /// Print recipe and cue buffer statistics
    Inspect {
        /// Sample rate to render at
        #[arg(long, default_value_t = 48_000.0)]
        sample_rate: f32,
    },

    /// Play an effect on the default output device
    Play {
        /// start | bip | fail
        effect: EffectKind,

        /// Number of triggers
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Time between triggers
        #[arg(long, default_value_t = 20)]
        interval_ms: u64,

        /// Fade everything out after the last trigger
        #[arg(long)]
        fade_ms: Option<u64>,
    },

    /// Play random lane-safety ticks and move cues
    Cues {
        /// off | chord | arpeggio | lane-pulses
        #[arg(long, default_value = "chord")]
        mode: CueMode,

        /// none | lane | safety | combined
        #[arg(long, default_value = "combined")]
        style: MoveCueStyle,

        /// Number of ticks
        #[arg(long, default_value_t = 8)]
        ticks: usize,

        /// Time between ticks
        #[arg(long, default_value_t = 600)]
        interval_ms: u64,
    },
}

impl Global {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_voices(self.voices)
            .with_fail_tail_repeats(self.fail_tail)
            .with_volume(self.volume)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Devices => devices(),
        Commands::Inspect { sample_rate } => inspect(&cli.global, sample_rate),
        Commands::Play { effect, count, interval_ms, fade_ms } => {
            play(&cli.global, effect, count, Duration::from_millis(interval_ms), fade_ms.map(Duration::from_millis))
        }
        Commands::Cues { mode, style, ticks, interval_ms } => {
            cues(&cli.global, mode, style, ticks, Duration::from_millis(interval_ms))
        }
    }
}

fn devices() -> Result<()> {
    println!("Available output devices:");
    for name in output_device_names()? {
        println!("- {name}");
    }
    Ok(())
}

fn inspect(global: &Global, sample_rate: f32) -> Result<()> {
    let profile = global.engine_config().profile();
    println!("effects @ {sample_rate} Hz");
    for kind in EffectKind::ALL {
        let recipe = profile.recipe(kind);
        let buf = render(recipe, sample_rate)?;
        println!(
            "  {kind:<6} segments={:<3} duration={:.3}s frames={:<7} peak={:.3}",
            recipe.expanded().len(),
            recipe.duration(),
            buf.frames(),
            buf.peak()
        );
    }

    let cues = LaneCueProfile::default();
    println!("tick cues (frames per safe-lane mask 000..111)");
    for mode in CueMode::AUDIBLE {
        let frames = SafeLanes::all_masks()
            .map(|m| render_tick(&cues, mode, m, sample_rate).map(|b| b.frames().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        println!("  {mode:<12} {}", frames.join(" "));
    }
    Ok(())
}

fn play(global: &Global, effect: EffectKind, count: usize, interval: Duration, fade: Option<Duration>) -> Result<()> {
    let backend = Arc::new(CpalBackend::new());
    let engine = EffectEngine::new(backend, Arc::new(ThreadScheduler::new()), &global.engine_config());
    if engine.health() == Health::Unavailable {
        bail!("audio engine unavailable (see log)");
    }
    let Some(buffer) = engine.buffer(effect) else {
        bail!("effect {effect} could not be prepared");
    };

    let (tx, rx) = unbounded();
    let t0 = Instant::now();
    for i in 0..count {
        let tx = tx.clone();
        engine.play(effect, Some(Box::new(move || { let _ = tx.send(i); })));
        log::info!("trigger #{i} ({} voices busy)", engine.playing_voices(effect));
        if i + 1 < count {
            sleep(interval);
        }
    }
    drop(tx);

    if let Some(fade) = fade {
        log::info!("fading out over {fade:?}");
        engine.stop_all(fade);
    }

    // Completions arrive until every trigger either finished or was superseded.
    let deadline = Instant::now() + Duration::from_secs_f32(buffer.duration()) + Duration::from_millis(250);
    let mut done = 0usize;
    while let Ok(i) = rx.recv_deadline(deadline) {
        done += 1;
        log::info!("trigger #{i} complete at {:?}", t0.elapsed());
    }
    println!("{done}/{count} completions");
    if let Some(fade) = fade {
        sleep(fade);
    }
    Ok(())
}

fn cues(global: &Global, mode: CueMode, style: MoveCueStyle, ticks: usize, interval: Duration) -> Result<()> {
    let backend = Arc::new(CpalBackend::new());
    let config = LaneCueConfig::default().with_volume(global.volume);
    let engine = LaneCueEngine::new(backend, Arc::new(ThreadScheduler::new()), &config);
    if engine.health() == Health::Unavailable {
        bail!("audio engine unavailable (see log)");
    }

    let mut rng = rand::thread_rng();
    let mut lane = Lane::CENTER;
    for _ in 0..ticks {
        let Some(safe) = SafeLanes::from_bits(rng.gen_range(0..8)) else { continue };
        println!("safe lanes {:03b}", safe.bits());
        engine.play_tick_cue(safe, mode);
        sleep(interval / 2);

        if let Some(next) = Lane::new(rng.gen_range(0..Lane::ALL.len())) {
            lane = next;
        }
        println!("  move -> lane {} ({})", lane.index(), if safe.contains(lane) { "safe" } else { "unsafe" });
        engine.play_move_cue(lane, safe.contains(lane), mode, style);
        sleep(interval / 2);
    }
    engine.stop_all(Duration::from_millis(200));
    sleep(Duration::from_millis(250));
    Ok(())
}
