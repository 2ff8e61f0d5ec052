//! Configuration Vault – reads/writes `~/.sensorlink/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sensorlink_feed::{FeedSettings, ScreenOrientation};
use sensorlink_transport::{EmulatorAddr, MIN_PROBE_INTERVAL};
use sensorlink_types::LinkError;

/// Persisted user configuration stored in `~/.sensorlink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Host running the emulator's WebSocket endpoint.
    #[serde(default = "default_emulator_host")]
    pub emulator_host: String,

    #[serde(default = "default_emulator_port")]
    pub emulator_port: u16,

    /// Origin probed with `HEAD` while connected (e.g.
    /// `http://192.168.1.20:8000`). Probing is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_origin: Option<String>,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Negate accelerometer axes (devices with the opposite sign convention).
    #[serde(default)]
    pub reversed_axes: bool,

    #[serde(default = "default_accel_flush_ms")]
    pub accel_flush_ms: u64,

    #[serde(default = "default_motion_throttle_ms")]
    pub motion_throttle_ms: u64,

    #[serde(default = "default_orientation_throttle_ms")]
    pub orientation_throttle_ms: u64,

    /// Device held in landscape: headings are turned a quarter.
    #[serde(default)]
    pub landscape: bool,
}

fn default_emulator_host() -> String {
    "localhost".to_string()
}
fn default_emulator_port() -> u16 {
    9000
}
fn default_probe_interval_ms() -> u64 {
    2000
}
fn default_accel_flush_ms() -> u64 {
    200
}
fn default_motion_throttle_ms() -> u64 {
    10
}
fn default_orientation_throttle_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emulator_host: default_emulator_host(),
            emulator_port: default_emulator_port(),
            page_origin: None,
            probe_interval_ms: default_probe_interval_ms(),
            reversed_axes: false,
            accel_flush_ms: default_accel_flush_ms(),
            motion_throttle_ms: default_motion_throttle_ms(),
            orientation_throttle_ms: default_orientation_throttle_ms(),
            landscape: false,
        }
    }
}

impl Config {
    pub fn emulator_addr(&self) -> EmulatorAddr {
        EmulatorAddr::new(self.emulator_host.clone(), self.emulator_port)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms).max(MIN_PROBE_INTERVAL)
    }

    pub fn screen_orientation(&self) -> ScreenOrientation {
        if self.landscape {
            ScreenOrientation::Landscape
        } else {
            ScreenOrientation::Portrait
        }
    }

    /// Reject timing values the link and feed cannot run with.
    pub fn validate(&self) -> Result<(), LinkError> {
        let timings = [
            ("probe_interval_ms", self.probe_interval_ms),
            ("accel_flush_ms", self.accel_flush_ms),
            ("motion_throttle_ms", self.motion_throttle_ms),
            ("orientation_throttle_ms", self.orientation_throttle_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(LinkError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            reversed_axes: self.reversed_axes,
            accel_flush: Duration::from_millis(self.accel_flush_ms),
            motion_throttle: Duration::from_millis(self.motion_throttle_ms),
            orientation_throttle: Duration::from_millis(self.orientation_throttle_ms),
            screen: self.screen_orientation(),
        }
    }
}

/// Return the path to `~/.sensorlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sensorlink").join("config.toml")
}

/// Load the config from disk and apply env overrides.  Returns `None` if
/// the file does not exist.
pub fn load() -> Result<Option<Config>, LinkError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, LinkError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        LinkError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| LinkError::Config(format!("failed to parse config: {e}")))?;
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `SENSORLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SENSORLINK_EMULATOR_HOST` | `emulator_host` |
/// | `SENSORLINK_EMULATOR_PORT` | `emulator_port` |
/// | `SENSORLINK_PAGE_ORIGIN` | `page_origin` (empty string clears it) |
/// | `SENSORLINK_REVERSED_AXES` | `reversed_axes` (`1`/`true`/`yes`) |
/// | `SENSORLINK_LANDSCAPE` | `landscape` (`1`/`true`/`yes`) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SENSORLINK_EMULATOR_HOST") {
        cfg.emulator_host = v;
    }
    if let Ok(v) = std::env::var("SENSORLINK_EMULATOR_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.emulator_port = port;
    }
    if let Ok(v) = std::env::var("SENSORLINK_PAGE_ORIGIN") {
        cfg.page_origin = if v.trim().is_empty() { None } else { Some(v) };
    }
    if let Ok(v) = std::env::var("SENSORLINK_REVERSED_AXES")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.reversed_axes = flag;
    }
    if let Ok(v) = std::env::var("SENSORLINK_LANDSCAPE")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.landscape = flag;
    }
}

/// Lenient yes/no parsing shared by env overrides and the settings prompts.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.sensorlink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), LinkError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), LinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LinkError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                LinkError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| LinkError::Config(format!("failed to serialize config: {e}")))?;
    let write_err =
        |e: std::io::Error| LinkError::Config(format!("failed to write config at {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            emulator_host: "10.0.0.7".into(),
            emulator_port: 12344,
            page_origin: Some("http://10.0.0.7:8000".into()),
            reversed_axes: true,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.emulator_host, "10.0.0.7");
        assert_eq!(loaded.emulator_port, 12344);
        assert_eq!(loaded.page_origin.as_deref(), Some("http://10.0.0.7:8000"));
        assert!(loaded.reversed_axes);
        assert_eq!(loaded.probe_interval_ms, 2000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "emulator_port = 4000\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.emulator_port, 4000);
        assert_eq!(loaded.accel_flush_ms, 200);
        assert_eq!(loaded.motion_throttle_ms, 10);
        assert_eq!(loaded.orientation_throttle_ms, 500);
        assert!(loaded.page_origin.is_none());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "emulator_port = \"not a number\"\n").expect("write");
        assert!(matches!(load_from(&path), Err(LinkError::Config(_))));
    }

    #[test]
    fn zero_timings_are_rejected_on_load() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        for field in ["probe_interval_ms", "accel_flush_ms", "motion_throttle_ms"] {
            std::fs::write(&path, format!("{field} = 0\n")).expect("write");
            match load_from(&path) {
                Err(LinkError::Config(msg)) => assert!(msg.contains(field), "{msg}"),
                other => panic!("{field} = 0 must be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn probe_interval_never_zero() {
        let cfg = Config {
            probe_interval_ms: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.probe_interval(), MIN_PROBE_INTERVAL);
    }

    #[test]
    fn landscape_turns_feed_headings() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "landscape = true\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.feed_settings().screen, ScreenOrientation::Landscape);
        assert_eq!(Config::default().feed_settings().screen, ScreenOrientation::Portrait);
    }

    #[test]
    fn config_path_points_to_sensorlink_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.sensorlink/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn derived_settings_follow_config() {
        let cfg = Config {
            reversed_axes: true,
            accel_flush_ms: 250,
            ..Config::default()
        };
        let settings = cfg.feed_settings();
        assert!(settings.reversed_axes);
        assert_eq!(settings.accel_flush, Duration::from_millis(250));
        assert_eq!(cfg.emulator_addr().url(), "ws://localhost:9000/");
        assert_eq!(cfg.probe_interval(), Duration::from_secs(2));
    }

    #[test]
    fn flags_parse_leniently() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    // All env-var cases live in one test so they never race each other.
    #[test]
    fn apply_env_overrides_reads_sensorlink_vars() {
        // SAFETY: only this test touches SENSORLINK_* variables.
        unsafe {
            std::env::set_var("SENSORLINK_EMULATOR_HOST", "emu-host");
            std::env::set_var("SENSORLINK_EMULATOR_PORT", "not-a-port");
            std::env::set_var("SENSORLINK_PAGE_ORIGIN", "http://phone:8000");
            std::env::set_var("SENSORLINK_REVERSED_AXES", "true");
            std::env::set_var("SENSORLINK_LANDSCAPE", "yes");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.emulator_host, "emu-host");
        assert_eq!(cfg.emulator_port, 9000);
        assert_eq!(cfg.page_origin.as_deref(), Some("http://phone:8000"));
        assert!(cfg.reversed_axes);
        assert!(cfg.landscape);

        unsafe {
            std::env::set_var("SENSORLINK_EMULATOR_PORT", "12344");
            std::env::set_var("SENSORLINK_PAGE_ORIGIN", "");
        }
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.emulator_port, 12344);
        assert!(cfg.page_origin.is_none());

        unsafe {
            for var in [
                "SENSORLINK_EMULATOR_HOST",
                "SENSORLINK_EMULATOR_PORT",
                "SENSORLINK_PAGE_ORIGIN",
                "SENSORLINK_REVERSED_AXES",
                "SENSORLINK_LANDSCAPE",
            ] {
                std::env::remove_var(var);
            }
        }
    }
}
