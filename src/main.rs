use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley::client::ClipClient;
use parley::voice::{AudioCapture, AudioPlayback};
use parley::{Config, ConversationSession, GREETING, PlaybackQueue, SessionUpdate, Speaker};

/// Parley - Real-time spoken-dialogue client for AI assistants
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Dialogue service base URL
    #[arg(short, long, env = "PARLEY_SERVER_URL")]
    server: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    // Load configuration
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(server = %config.server.base_url, "starting parley");

    // Audio in and out
    let (mut capture, frames) = AudioCapture::new()?;
    let playback = AudioPlayback::new()?;

    // Playback queue worker
    let clips = ClipClient::new(config.server.base_url.clone());
    let (queue, _worker) = PlaybackQueue::spawn(
        clips,
        playback,
        Duration::from_millis(config.voice.clip_retry_ms),
    );

    // The conversation core
    let sample_rate = capture.sample_rate();
    let (session, updates) = ConversationSession::new(&config, sample_rate, queue);

    // Terminal transcript renderer (the presentation layer)
    let renderer = tokio::spawn(render_updates(updates));

    capture.start()?;
    println!("bot: {GREETING}");
    tracing::info!("listening - speak into your microphone (ctrl-c to quit)");

    tokio::select! {
        () = session.run(frames) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    capture.stop();
    renderer.abort();
    Ok(())
}

/// Render session updates as transcript lines
async fn render_updates(mut updates: tokio::sync::mpsc::UnboundedReceiver<SessionUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::TurnCommitted(turn) => {
                let who = match turn.speaker {
                    Speaker::User => "you",
                    Speaker::Bot => "bot",
                };
                println!("{who}: {}", turn.text);
            }
            SessionUpdate::TurnFailed(reason) => {
                eprintln!("[turn failed: {reason}]");
            }
            SessionUpdate::Playback(state) => {
                tracing::debug!(%state, "playback");
            }
            SessionUpdate::TextDelta(_) => {
                // the committed turn carries the full text; a richer
                // frontend would type these out incrementally
            }
        }
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (mut capture, mut frames) = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            samples.extend(frame);
        }

        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let sample_rate = 24000_i32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.play_samples(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}
