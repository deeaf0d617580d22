use std::path::PathBuf;
use std::sync::Once;

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve Deeplinker home directory.
///
/// Priority:
/// 1) DEEPLINKER_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.deeplinker
pub fn deeplinker_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("DEEPLINKER_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".deeplinker");
    }
    PathBuf::from(".").join(".deeplinker")
}

fn ensure_home_dir(home: &PathBuf) {
    if let Err(err) = std::fs::create_dir_all(home) {
        CREATE_DIR_WARNED.call_once(|| {
            eprintln!(
                "Warning: failed to create Deeplinker home directory {}: {}. Set DEEPLINKER_HOME or pass --config.",
                home.display(),
                err
            );
        });
    }
}

/// Default config path: ~/.deeplinker/config.toml
pub fn default_config_path() -> PathBuf {
    deeplinker_home().join("config.toml")
}

/// Default link store path: ~/.deeplinker/links.json
pub fn default_links_path() -> PathBuf {
    let home = deeplinker_home();
    ensure_home_dir(&home);
    home.join("links.json")
}

/// Default relay path: ~/.deeplinker/relay.json
pub fn default_relay_path() -> PathBuf {
    let home = deeplinker_home();
    ensure_home_dir(&home);
    home.join("relay.json")
}

/// Default logs directory: ~/.deeplinker/logs
pub fn default_logs_dir() -> PathBuf {
    let home = deeplinker_home();
    ensure_home_dir(&home);
    home.join("logs")
}
