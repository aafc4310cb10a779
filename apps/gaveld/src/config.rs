//! Configuration files live in one directory:
//!
//! - `config.toml` with `[Server]` and `[MasterServer]` tables,
//! - `areas.toml` (`[[area]]`) and `roles.toml` (`[[role]]`),
//! - plain line files: `music.txt`, `characters.txt`, `backgrounds.txt`,
//!   `parrot.txt`.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::area::EvidenceMode;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(rename = "Server", default)]
    pub server: ServerConfig,
    #[serde(rename = "MasterServer", default)]
    pub master: MasterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    pub name: String,
    pub description: String,
    pub motd: String,
    pub max_players: usize,
    pub max_message_length: usize,
    pub log_buffer_size: usize,
    pub default_ban_duration: String,
    pub log_level: String,
    pub log_directory: String,
    pub enable_webao: bool,
    pub webao_port: u16,
    pub webao_origin: String,
    pub multiclient_limit: usize,
    pub max_dice: u32,
    pub max_sides: u32,
    pub asset_url: String,
    pub webhook_url: String,
    /// Log every inbound record; set by the `--netdebug` flag.
    #[serde(skip)]
    pub netdebug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: 27016,
            name: "Unnamed Server".to_string(),
            description: String::new(),
            motd: "Welcome!".to_string(),
            max_players: 100,
            max_message_length: 256,
            log_buffer_size: 150,
            default_ban_duration: "3d".to_string(),
            log_level: "info".to_string(),
            log_directory: "logs".to_string(),
            enable_webao: false,
            webao_port: 27017,
            webao_origin: "https://web.aceattorneyonline.com".to_string(),
            multiclient_limit: 16,
            max_dice: 100,
            max_sides: 100,
            asset_url: String::new(),
            webhook_url: String::new(),
            netdebug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub advertise: bool,
    pub addr: String,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            advertise: false,
            addr: "https://servers.aceattorneyonline.com/servers".to_string(),
        }
    }
}

/// Per-area settings from `areas.toml`. These are the immutable defaults an
/// area reverts to on reset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub name: String,
    pub background: String,
    pub evidence_mode: EvidenceMode,
    pub allow_iniswap: bool,
    pub force_nointerrupt: bool,
    pub allow_cms: bool,
    pub force_bglist: bool,
    pub lock_bg: bool,
    pub lock_music: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Area".to_string(),
            background: "default".to_string(),
            evidence_mode: EvidenceMode::Any,
            allow_iniswap: true,
            force_nointerrupt: false,
            allow_cms: true,
            force_bglist: true,
            lock_bg: false,
            lock_music: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub fn load_config(dir: &Path) -> anyhow::Result<Config> {
    let path = dir.join("config.toml");
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let conf: Config =
        toml::from_str(&s).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(conf)
}

pub fn load_areas(dir: &Path) -> anyhow::Result<Vec<AreaConfig>> {
    #[derive(Deserialize)]
    struct AreasFile {
        #[serde(default)]
        area: Vec<AreaConfig>,
    }

    let path = dir.join("areas.toml");
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let f: AreasFile =
        toml::from_str(&s).with_context(|| format!("failed to parse {}", path.display()))?;
    if f.area.is_empty() {
        anyhow::bail!("empty area list in {}", path.display());
    }
    Ok(f.area)
}

pub fn load_roles(dir: &Path) -> anyhow::Result<Vec<RoleConfig>> {
    #[derive(Deserialize)]
    struct RolesFile {
        #[serde(default)]
        role: Vec<RoleConfig>,
    }

    let path = dir.join("roles.toml");
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let f: RolesFile =
        toml::from_str(&s).with_context(|| format!("failed to parse {}", path.display()))?;
    if f.role.is_empty() {
        anyhow::bail!("empty role list in {}", path.display());
    }
    Ok(f.role)
}

/// Read a line file, skipping blank lines.
pub fn load_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(s.lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read `music.txt`. Entries containing a `.` are songs, others are category
/// rows; if the file opens with a song, a synthetic "Songs" category is
/// prepended so clients always see at least one category.
pub fn load_music(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut music = load_lines(&dir.join("music.txt"))?;
    if music.is_empty() {
        anyhow::bail!("empty music list");
    }
    if music[0].contains('.') {
        music.insert(0, "Songs".to_string());
    }
    Ok(music)
}

pub fn db_path(dir: &Path) -> PathBuf {
    dir.join("gaveld.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_table() {
        let conf: Config = toml::from_str(
            r#"
[Server]
port = 27020
name = "Test Court"
max_players = 25

[MasterServer]
advertise = true
"#,
        )
        .unwrap();
        assert_eq!(conf.server.port, 27020);
        assert_eq!(conf.server.name, "Test Court");
        assert_eq!(conf.server.max_players, 25);
        // Untouched fields keep their defaults.
        assert_eq!(conf.server.max_message_length, 256);
        assert_eq!(conf.server.multiclient_limit, 16);
        assert!(conf.master.advertise);
    }

    #[test]
    fn parses_area_list() {
        #[derive(Deserialize)]
        struct AreasFile {
            area: Vec<AreaConfig>,
        }
        let f: AreasFile = toml::from_str(
            r#"
[[area]]
name = "Basement"
background = "birthday"
evidence_mode = "cms"
allow_iniswap = false

[[area]]
name = "Courtroom 1"
"#,
        )
        .unwrap();
        assert_eq!(f.area.len(), 2);
        assert_eq!(f.area[0].name, "Basement");
        assert_eq!(f.area[0].evidence_mode, EvidenceMode::Cms);
        assert!(!f.area[0].allow_iniswap);
        assert!(f.area[1].allow_iniswap);
    }
}
