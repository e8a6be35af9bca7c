use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, GuildId, UserId};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/obs-clipper/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    pub obs: Obs,
    pub clips: Clips,
    #[serde(default)]
    pub presence: Presence,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    /// Whose voice channel presence gates recording
    pub primary_user_id: UserId,
    /// Only voice channels in these servers are watched.  Empty means all servers.
    #[serde(default)]
    pub guilds: Vec<GuildId>,
    /// Global usernames allowed to run owner-only commands, in addition to the primary user
    #[serde(default)]
    pub bot_owners: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Obs {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    /// Empty when obs-websocket authentication is disabled
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Clips {
    /// Directory OBS saves replays to
    pub path: PathBuf,
    /// Where clip announcements are posted
    pub channel_id: ChannelId,
    /// OBS remuxes replays to mp4 after saving; announce the mp4 instead of the mkv
    #[serde(default)]
    pub remux: bool,
    /// Edit the session's announcements to carry their clip once the primary user leaves
    #[serde(default)]
    pub attach_on_session_end: bool,
    /// Command played when a replay is saved, e.g. `["aplay", "sfx/clip.wav"]`
    #[serde(default)]
    pub sound_effect_command: Vec<String>,
    /// Command whose stdout names the focused window, e.g.
    /// `["xdotool", "getactivewindow", "getwindowname"]`
    #[serde(default)]
    pub active_window_command: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Presence {
    pub grace_period_seconds: u64,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            grace_period_seconds: crate::presence::GRACE_PERIOD.as_secs(),
        }
    }
}

fn default_command_prefix() -> String {
    ";".to_owned()
}

fn default_status() -> String {
    "Recording people".to_owned()
}

fn default_obs_host() -> String {
    "localhost".to_owned()
}

fn default_obs_port() -> u16 {
    4455
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }

    pub fn obs_password(&self) -> Option<&str> {
        Some(self.obs.password.as_str()).filter(|p| !p.is_empty())
    }

    pub fn watches_guild(&self, guild_id: Option<GuildId>) -> bool {
        match guild_id {
            Some(guild_id) => {
                self.general.guilds.is_empty() || self.general.guilds.contains(&guild_id)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [general]
        discord_token = "token"
        primary_user_id = "1234"

        [obs]

        [clips]
        path = "/home/me/Videos"
        channel_id = "5678"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::parse(MINIMAL).unwrap();
        assert_eq!(cfg.general.primary_user_id, UserId::new(1234));
        assert_eq!(cfg.general.command_prefix, ";");
        assert!(cfg.general.guilds.is_empty());
        assert_eq!(cfg.obs.host, "localhost");
        assert_eq!(cfg.obs.port, 4455);
        assert_eq!(cfg.obs_password(), None);
        assert_eq!(cfg.clips.channel_id, ChannelId::new(5678));
        assert!(!cfg.clips.remux);
        assert!(!cfg.clips.attach_on_session_end);
        assert_eq!(cfg.presence.grace_period_seconds, 30);
    }

    #[test]
    fn full_config() {
        let cfg = Config::parse(
            r#"
            [general]
            discord_token = "token"
            primary_user_id = "1234"
            guilds = ["42"]
            bot_owners = ["someone"]
            command_prefix = "!"

            [obs]
            host = "10.0.0.2"
            port = 4444
            password = "hunter2"

            [clips]
            path = "/clips"
            channel_id = "5678"
            remux = true
            attach_on_session_end = true
            sound_effect_command = ["aplay", "clip.wav"]

            [presence]
            grace_period_seconds = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.obs_password(), Some("hunter2"));
        assert_eq!(cfg.obs.port, 4444);
        assert!(cfg.clips.remux);
        assert_eq!(cfg.clips.sound_effect_command, ["aplay", "clip.wav"]);
        assert_eq!(cfg.presence.grace_period_seconds, 10);
        assert!(cfg.watches_guild(Some(GuildId::new(42))));
        assert!(!cfg.watches_guild(Some(GuildId::new(43))));
        assert!(!cfg.watches_guild(None));
    }

    #[test]
    fn missing_section_is_an_error() {
        assert!(Config::parse("[general]\ndiscord_token = \"t\"").is_err());
    }
}
