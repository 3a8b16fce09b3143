//! Application entry point for voice-gate.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`AppConfig`] (defaults on first run).
//! 3. Load the passphrase list.  A missing or empty list is fatal.
//! 4. Load the Whisper model and wrap it in a [`StreamingTranscriber`].
//! 5. Build the microphone input, cue player and unlock signal.
//! 6. Spawn the [`Dispatcher`] on the tokio runtime.
//! 7. Start the hotkey listener and the stdin trigger.
//! 8. Wait for Ctrl-C, then shut everything down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use voice_gate::{
    access::{
        AccessEvaluator, AttemptPolicy, Collaborators, Dispatcher, Shutdown, SoundPlayer,
        SystemClock, Trigger, UnlockSignal,
    },
    audio::{CueLibrary, CuePlayer, MicrophoneInput},
    config::{AppConfig, AppPaths},
    hotkey::{parse_key, TriggerListener},
    passphrase::PassphraseStore,
    stt::{resolve_model_path, StreamingTranscriber, WhisperEngine},
    unlock::{LogOnlyUnlock, MqttUnlockSignal},
};

/// Pending triggers beyond this are dropped by the sources.
const TRIGGER_QUEUE: usize = 8;

const FALLBACK_HOTKEY: &str = "F9";

// ---------------------------------------------------------------------------
// Trigger sources
// ---------------------------------------------------------------------------

/// Start the global hotkey listener.  Returns `None` when the hotkey is
/// disabled or the listener thread could not be spawned.
fn start_hotkey(name: &str, tx: mpsc::Sender<Trigger>) -> Option<TriggerListener> {
    if name.trim().is_empty() {
        log::info!("hotkey: disabled");
        return None;
    }
    let key = parse_key(name).or_else(|| {
        log::warn!("hotkey: unknown key {:?}, falling back to {}", name, FALLBACK_HOTKEY);
        parse_key(FALLBACK_HOTKEY)
    })?;
    match TriggerListener::start(key, tx) {
        Ok(listener) => Some(listener),
        Err(e) => {
            log::error!("hotkey: failed to start listener thread: {}", e);
            None
        }
    }
}

/// Every line on stdin (just pressing Enter) is a manual trigger.
async fn read_stdin_triggers(tx: mpsc::Sender<Trigger>, shutdown: Shutdown) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            line = lines.next_line() => match line {
                Ok(Some(_)) => {
                    if tx.try_send(Trigger::Manual).is_err() {
                        log::debug!("stdin: trigger dropped, dispatcher busy");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("stdin: read failed: {}", e);
                    break;
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run(paths: AppPaths, config: AppConfig) -> Result<()> {
    let shutdown = Shutdown::new();

    // Passphrases
    let store = PassphraseStore::load(
        config.passphrase_file(&paths),
        config.passphrases.case_sensitive,
    )
    .context("failed to load passphrases")?;
    log::info!(
        "passphrase: {} phrase(s) loaded from {}",
        store.count(),
        store.path().display()
    );

    // STT
    let model_path = resolve_model_path(&paths.models_dir, &config.stt.model);
    let engine = WhisperEngine::load(&model_path, config.whisper_params(store.as_slice()))
        .with_context(|| format!("failed to load Whisper model {}", model_path.display()))?;
    let transcriber = StreamingTranscriber::new(Arc::new(engine), config.streaming_config());

    // Audio in / out
    let audio = MicrophoneInput::new(config.audio.input_device.clone(), shutdown.clone())
        .with_target_rate(config.audio.sample_rate);
    let player: Arc<dyn SoundPlayer> = Arc::new(CuePlayer::new(CueLibrary::new(
        config.sounds_dir(&paths),
        config.sounds.force_quiet_hours,
    )));

    // Unlock
    let unlock: Arc<dyn UnlockSignal> = if config.mqtt.enabled {
        log::info!(
            "unlock: MQTT {}:{} topic {}",
            config.mqtt.broker,
            config.mqtt.port,
            config.mqtt.topic
        );
        Arc::new(MqttUnlockSignal::start(&config.mqtt, shutdown.clone()))
    } else {
        Arc::new(LogOnlyUnlock)
    };

    let evaluator = AccessEvaluator::new(
        config.evaluator_config(),
        store,
        AttemptPolicy::new(config.policy_config()),
        Collaborators {
            audio: Arc::new(audio),
            transcriber: Box::new(transcriber),
            player: player.clone(),
            clock: Arc::new(SystemClock),
        },
    )?
    .with_shutdown(shutdown.clone());

    // Dispatcher and trigger sources
    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(TRIGGER_QUEUE);
    let dispatcher = Dispatcher::new(evaluator, player, unlock).with_shutdown(shutdown.clone());
    let worker = tokio::spawn(dispatcher.run(trigger_rx));

    let _hotkey = start_hotkey(&config.trigger.hotkey, trigger_tx.clone());
    tokio::spawn(read_stdin_triggers(trigger_tx, shutdown.clone()));

    log::info!("voice-gate ready, press the hotkey or Enter to speak a passphrase");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("failed to listen for Ctrl-C: {}", e);
            }
            log::info!("shutting down");
            shutdown.trigger();
        }
        _ = shutdown.wait() => {}
    }

    worker.await.context("dispatcher task panicked")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-gate starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load_from(&paths.settings_file)
        .with_context(|| format!("failed to read {}", paths.settings_file.display()))?;
    config.validate().context("invalid configuration")?;

    // 3. Tokio runtime (evaluations run on the blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = rt.block_on(run(paths, config));

    // stdin reads park a blocking thread that never returns on its own.
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}
