// ChatSleuth - platform/sound.rs
//
// Notification sound playback through an external ffplay process.
//
// `play` blocks until the player exits (ffplay -autoexit), so callers must
// run it off the tail thread. The notifier dispatches it to its own playback
// pool.

use crate::platform::config::{resolve_app_relative, AppConfig};
use crate::util::constants::{FFPLAY_MAX_VOLUME, MAX_NOTIFY_VOLUME};
use crate::util::error::NotifyError;
#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Process creation flag that keeps ffplay from flashing a console window.
#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// The "play notification sound at volume V" capability.
pub trait SoundPlayer: Send + Sync {
    /// Play the notification sound at `volume` percent (0-100).
    fn play(&self, volume: u8) -> Result<(), NotifyError>;
}

/// Map a 0-100 volume to ffplay's 0-256 `-volume` range, clamped.
pub fn ffplay_volume(volume: u8) -> u16 {
    let percent = u32::from(volume.min(MAX_NOTIFY_VOLUME));
    let scaled = percent * u32::from(FFPLAY_MAX_VOLUME) / u32::from(MAX_NOTIFY_VOLUME);
    // percent is clamped to 100, so scaled <= 256 and fits.
    (scaled as u16).min(FFPLAY_MAX_VOLUME)
}

/// Plays a sound file with `ffplay -nodisp -autoexit`.
#[derive(Debug, Clone)]
pub struct FfplayPlayer {
    player: PathBuf,
    sound_file: PathBuf,
}

impl FfplayPlayer {
    pub fn new(player: impl Into<PathBuf>, sound_file: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sound_file: sound_file.into(),
        }
    }

    /// Build from config, anchoring relative paths at the executable.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            resolve_app_relative(&config.player),
            resolve_app_relative(&config.sound_file),
        )
    }
}

impl SoundPlayer for FfplayPlayer {
    fn play(&self, volume: u8) -> Result<(), NotifyError> {
        if !self.sound_file.is_file() {
            return Err(NotifyError::SoundNotFound {
                path: self.sound_file.clone(),
            });
        }

        let mut command = Command::new(&self.player);
        #[cfg(target_os = "windows")]
        command.creation_flags(CREATE_NO_WINDOW);
        command
            .arg("-nodisp")
            .arg("-autoexit")
            .arg("-loglevel")
            .arg("quiet")
            .arg("-volume")
            .arg(ffplay_volume(volume).to_string())
            .arg(&self.sound_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        tracing::debug!(
            player = %self.player.display(),
            sound = %self.sound_file.display(),
            volume,
            "Playing notification sound"
        );

        let status = command.status().map_err(|source| NotifyError::PlayerSpawn {
            player: self.player.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::PlayerExit {
                player: self.player.clone(),
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_maps_linearly_and_clamps() {
        assert_eq!(ffplay_volume(0), 0);
        assert_eq!(ffplay_volume(1), 2);
        assert_eq!(ffplay_volume(50), 128);
        assert_eq!(ffplay_volume(100), 256);
        assert_eq!(ffplay_volume(200), 256);
    }

    #[test]
    fn test_missing_sound_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let player = FfplayPlayer::new("ffplay", dir.path().join("missing.wav"));
        match player.play(100) {
            Err(NotifyError::SoundNotFound { path }) => {
                assert!(path.ends_with("missing.wav"));
            }
            other => panic!("expected SoundNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_player_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sound = dir.path().join("notify.wav");
        std::fs::write(&sound, b"RIFF").unwrap();
        let player = FfplayPlayer::new(dir.path().join("no-such-player"), &sound);
        assert!(matches!(
            player.play(50),
            Err(NotifyError::PlayerSpawn { .. })
        ));
    }
}
