use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct Config {
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve the data directory (explicit override, else the platform data
    /// dir) and create it.
    pub fn load(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => ProjectDirs::from("", "", "cookbook")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("cookbook.db");
        let cache_dir = data_dir.join("local");

        Ok(Config {
            db_path,
            cache_dir,
            data_dir,
        })
    }

    /// Load the API key from disk, or generate and store a new one (printed
    /// once on stderr).
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}
