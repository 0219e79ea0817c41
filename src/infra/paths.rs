// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the SURVEYOR_HOME environment variable for isolation.
// When SURVEYOR_HOME is set, config and data live under that directory.
// When unset, config uses ~/.surveyor/ and data uses XDG_DATA_HOME/surveyor.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "surveyor").expect("Could not determine home directory")
    })
}

/// Returns the SURVEYOR_HOME override, if set.
fn surveyor_home() -> Option<PathBuf> {
    std::env::var_os("SURVEYOR_HOME").map(PathBuf::from)
}

/// Configuration directory: $SURVEYOR_HOME/ or ~/.surveyor/
pub fn config_dir() -> PathBuf {
    if let Some(home) = surveyor_home() {
        return home;
    }
    dirs_home().join(".surveyor")
}

/// Data directory: $SURVEYOR_HOME/data/ or XDG_DATA_HOME/surveyor
pub fn data_dir() -> PathBuf {
    if let Some(home) = surveyor_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Database path
pub fn db_path() -> PathBuf {
    data_dir().join("surveyor.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    let dirs = [config_dir(), data_dir()];

    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(())
}
