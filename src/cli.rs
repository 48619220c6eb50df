//! Terminal front-end: command-line flags and the interactive mixer shell

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::audio::device;
use crate::catalog::{find_preset, TIMER_PRESETS};
use crate::config::MixerConfig;
use crate::coordinator::{Mixer, MixerSnapshot};
use crate::timer::format_time;

/// Flags accepted by the `soundpalette` binary
#[derive(Parser, Debug, Default)]
#[command(name = "soundpalette", version, about = "Ambient sound mixer with sleep timer")]
pub struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing the loop files
    #[arg(long)]
    pub audio_dir: Option<PathBuf>,

    /// Output device name
    #[arg(long)]
    pub device: Option<String>,

    /// Fade-out length when the sleep timer ends, in milliseconds
    #[arg(long)]
    pub fade_ms: Option<u64>,

    /// Print the available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Override settings-file values with flags given on the command line
    pub fn apply(&self, config: &mut MixerConfig) {
        if let Some(dir) = &self.audio_dir {
            config.audio_dir = dir.clone();
        }
        if let Some(device) = &self.device {
            config.output_device = Some(device.clone());
        }
        if let Some(fade_ms) = self.fade_ms {
            config.fade_out_ms = fade_ms;
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "", no_binary_name = true, disable_version_flag = true)]
struct Shell {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Start a sound
    Play { id: String },
    /// Pause a sound
    Pause { id: String },
    /// Play or pause a sound
    Toggle { id: String },
    /// Set a sound's volume (0-100)
    #[command(alias = "vol")]
    Volume { id: String, percent: f32 },
    /// Play all sounds, or pause them if all are playing
    All,
    /// Stop everything, restore default volumes and clear the timer
    Reset,
    /// Sleep timer: 15, 30, 60, 90, a number of minutes, or off
    Timer { preset: String },
    /// Show the mixer state
    #[command(alias = "s")]
    Status,
    /// List the sound palette
    Sounds,
    /// List output devices
    Devices,
    /// Leave the mixer
    #[command(alias = "exit")]
    Quit,
}

/// Handle one shell line. Returns `Ok(true)` when the user asked to quit.
pub fn respond(line: &str, mixer: &Mixer) -> Result<bool, String> {
    let args = shlex::split(line).ok_or("error: invalid quoting")?;
    let shell = Shell::try_parse_from(args).map_err(|e| e.to_string())?;

    match shell.command {
        ShellCommand::Play { id } => {
            require_sound(mixer, &id)?;
            mixer.play(&id);
            report_start(mixer, &id)?;
        }
        ShellCommand::Pause { id } => {
            require_sound(mixer, &id)?;
            mixer.pause(&id);
        }
        ShellCommand::Toggle { id } => {
            require_sound(mixer, &id)?;
            mixer.toggle(&id);
        }
        ShellCommand::Volume { id, percent } => {
            require_sound(mixer, &id)?;
            mixer.set_volume(&id, percent / 100.0);
        }
        ShellCommand::All => mixer.toggle_all(),
        ShellCommand::Reset => mixer.reset(),
        ShellCommand::Timer { preset } => select_timer(mixer, &preset)?,
        ShellCommand::Status => print!("{}", render_status(&mixer.snapshot())),
        ShellCommand::Sounds => {
            for channel in mixer.snapshot().channels {
                println!("  {:<8} {}", channel.id, channel.label);
            }
        }
        ShellCommand::Devices => print_devices()?,
        ShellCommand::Quit => return Ok(true),
    }
    Ok(false)
}

fn require_sound(mixer: &Mixer, id: &str) -> Result<(), String> {
    match mixer.state(id) {
        Some(_) => Ok(()),
        None => Err(format!("error: unknown sound '{}' (try `sounds`)", id)),
    }
}

fn report_start(mixer: &Mixer, id: &str) -> Result<(), String> {
    match mixer.state(id) {
        Some(state) if !state.is_playing => Err(format!("'{}' could not start, see log", id)),
        _ => Ok(()),
    }
}

fn select_timer(mixer: &Mixer, value: &str) -> Result<(), String> {
    if let Some(preset) = find_preset(value) {
        mixer.select_timer(preset);
        return Ok(());
    }
    let minutes: u64 = value.trim_end_matches('m').parse().map_err(|_| {
        let keys: Vec<&str> = TIMER_PRESETS.iter().map(|p| p.key).collect();
        format!("error: timer expects minutes or one of {}", keys.join(", "))
    })?;
    let duration_ms = minutes
        .checked_mul(60 * 1000)
        .ok_or_else(|| format!("error: {} minutes is too long for the timer", minutes))?;
    if duration_ms == 0 {
        mixer.cancel_timer();
    } else {
        mixer.start_timer(duration_ms);
    }
    Ok(())
}

/// Render a snapshot as a small table
pub fn render_status(snapshot: &MixerSnapshot) -> String {
    let mut out = String::new();
    for channel in &snapshot.channels {
        out.push_str(&format!(
            "  {} {:<8} {:>3}%\n",
            if channel.is_playing { "[playing]" } else { "[paused] " },
            channel.label,
            (channel.volume * 100.0).round() as u32
        ));
    }
    out.push_str(&format!(
        "  all playing: {}\n",
        if snapshot.all_playing { "yes" } else { "no" }
    ));
    if snapshot.timer.is_running {
        out.push_str(&format!(
            "  sleep timer: {} remaining\n",
            format_time(snapshot.timer.remaining_ms)
        ));
    } else {
        out.push_str("  sleep timer: off\n");
    }
    out
}

/// Print every output device, marking the default
pub fn print_devices() -> Result<(), String> {
    let devices = device::list_output_devices().map_err(|e| e.to_string())?;
    if devices.is_empty() {
        println!("  no output devices found");
    }
    for info in devices {
        println!("  {}{}", info.name, if info.is_default { " (default)" } else { "" });
    }
    Ok(())
}

async fn announce_sleep(mut updates: watch::Receiver<MixerSnapshot>) {
    let mut was_running = updates.borrow().timer.is_running;
    while updates.changed().await.is_ok() {
        let timer = updates.borrow_and_update().timer;
        let finished = !timer.is_running && timer.remaining_ms == 0 && timer.duration_ms.is_some();
        if was_running && finished {
            println!("\nSleep timer finished, fading out");
        }
        was_running = timer.is_running;
    }
}

/// Read commands from stdin until `quit` or end of input
pub async fn run_shell(mixer: &Mixer) -> Result<(), String> {
    let announcer = tokio::spawn(announce_sleep(mixer.subscribe()));
    println!("Sound Palette - type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|e| e.to_string())?;

        let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, mixer) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => println!("{}", err.trim_end()),
        }
    }

    announcer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::resource::testing::RecordingLoader;
    use crate::catalog::SOUNDS;

    fn mixer() -> (Mixer, RecordingLoader) {
        let loader = RecordingLoader::new();
        let mixer = Mixer::new(SOUNDS, &loader, 2000);
        (mixer, loader)
    }

    #[tokio::test]
    async fn test_play_volume_and_quit() {
        let (mixer, _loader) = mixer();
        assert_eq!(respond("play fire", &mixer), Ok(false));
        assert_eq!(respond("volume fire 35", &mixer), Ok(false));
        let state = mixer.state("fire").unwrap();
        assert!(state.is_playing);
        assert!((state.volume - 0.35).abs() < 1e-6);

        assert_eq!(respond("vol fire 250", &mixer), Ok(false));
        assert_eq!(mixer.state("fire").map(|s| s.volume), Some(1.0));
        assert_eq!(respond("quit", &mixer), Ok(true));
        assert_eq!(respond("exit", &mixer), Ok(true));
    }

    #[tokio::test]
    async fn test_unknown_sound_and_bad_input() {
        let (mixer, _loader) = mixer();
        assert!(respond("play thunder", &mixer).is_err());
        assert!(respond("dance", &mixer).is_err());
        assert!(respond("play \"fire", &mixer).is_err());
    }

    #[tokio::test]
    async fn test_refused_start_is_reported() {
        let (mixer, loader) = mixer();
        loader.probe("birds.mp3").lock().refuse_start = true;
        assert!(respond("play birds", &mixer).is_err());
        assert_eq!(mixer.state("birds").map(|s| s.is_playing), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_command() {
        let (mixer, _loader) = mixer();
        assert_eq!(respond("timer 30", &mixer), Ok(false));
        assert_eq!(mixer.timer_state().duration_ms, Some(30 * 60 * 1000));

        assert_eq!(respond("timer 45m", &mixer), Ok(false));
        assert_eq!(mixer.timer_state().duration_ms, Some(45 * 60 * 1000));
        assert_eq!(mixer.snapshot().timer_preset, None);

        assert_eq!(respond("timer off", &mixer), Ok(false));
        assert!(!mixer.timer_state().is_running);
        assert!(respond("timer soon", &mixer).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_rejects_oversized_minutes() {
        let (mixer, _loader) = mixer();
        mixer.start_timer(60_000);
        let err = respond("timer 999999999999999999", &mixer).unwrap_err();
        assert!(err.starts_with("error:"));
        assert_eq!(mixer.timer_state().duration_ms, Some(60_000));
        assert!(mixer.timer_state().is_running);
    }

    #[tokio::test]
    async fn test_all_and_reset() {
        let (mixer, _loader) = mixer();
        respond("all", &mixer).unwrap();
        assert!(mixer.all_playing());
        respond("reset", &mixer).unwrap();
        assert!(!mixer.all_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_status() {
        let (mixer, _loader) = mixer();
        mixer.play("rain");
        mixer.start_timer(65_000);
        let text = render_status(&mixer.snapshot());
        assert!(text.contains("[playing] Rain"));
        assert!(text.contains("[paused]  Fire"));
        assert!(text.contains(" 60%"));
        assert!(text.contains("all playing: no"));
        assert!(text.contains("sleep timer: 01:05 remaining"));
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::try_parse_from([
            "soundpalette",
            "--audio-dir",
            "/srv/loops",
            "--fade-ms",
            "4000",
            "--device",
            "Speakers",
        ])
        .unwrap();
        let mut config = MixerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.audio_dir, PathBuf::from("/srv/loops"));
        assert_eq!(config.fade_out_ms, 4000);
        assert_eq!(config.output_device.as_deref(), Some("Speakers"));
        assert_eq!(config.audio, MixerConfig::default().audio);
    }
}
