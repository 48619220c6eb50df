pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod mixer;
pub mod scheduler;
pub mod timer;

use clap::Parser;

use audio::AudioEngine;
use catalog::SOUNDS;
use cli::Args;
use config::MixerConfig;
use coordinator::Mixer;

/// Parse flags, open the output device and run the interactive shell
pub async fn run() -> Result<(), String> {
    let args = Args::parse();
    if args.list_devices {
        return cli::print_devices();
    }

    let mut config = MixerConfig::load(args.config.as_deref());
    args.apply(&mut config);

    let engine = match AudioEngine::open(
        &config.audio_dir,
        config.output_device.as_deref(),
        &config.audio,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Audio output unavailable: {}", e);
            AudioEngine::disabled(&config.audio_dir)
        }
    };

    let mixer = Mixer::new(SOUNDS, &engine, config.fade_out_ms);
    log::info!("Loaded {} sounds from {:?}", SOUNDS.len(), config.audio_dir);

    let result = cli::run_shell(&mixer).await;
    mixer.shutdown();
    result
}
