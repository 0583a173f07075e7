use obsidian_fs::validate_relative_path;
use std::path::{Path, PathBuf};

use crate::sync::SyncSettings;

pub const VAULT_PATH_ENV: &str = "OBSIDIAN_VAULT_PATH";
pub const BIB_PATH_ENV: &str = "PAPER_SYNC_BIB";
pub const ARCHIVE_PATH_ENV: &str = "PAPER_SYNC_ARCHIVE";

pub const DEFAULT_BIB_PATH: &str = "references.bib";
pub const DEFAULT_ARCHIVE_PATH: &str = "obsidian_archive.json";
pub const DEFAULT_PAPERS_FOLDER: &str = "Papers";

/// Values given on the command line. Unset ones fall back to the environment,
/// then to the defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    pub vault: Option<String>,
    pub bib: Option<String>,
    pub archive: Option<String>,
    pub papers_folder: Option<String>,
}

/// Sync configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Obsidian vault root directory
    pub vault_path: PathBuf,
    /// Folder inside the vault holding the paper notes
    pub papers_folder: String,
    /// BibTeX export to sync from
    pub bib_path: PathBuf,
    /// JSON file remembering the last synced state
    pub archive_path: PathBuf,
    /// Settings handed to the reconciler
    pub sync: SyncSettings,
}

impl Config {
    /// Resolve configuration from arguments and environment variables.
    ///
    /// Environment variables:
    /// - `OBSIDIAN_VAULT_PATH`: vault root (supports ~ for home directory)
    /// - `PAPER_SYNC_BIB`: bibliography path
    /// - `PAPER_SYNC_ARCHIVE`: archive path
    pub fn from_env(args: ConfigArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    fn resolve(
        args: ConfigArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |arg: Option<String>, key: &str| {
            arg.or_else(|| env(key)).filter(|v| !v.trim().is_empty())
        };

        let vault = pick(args.vault, VAULT_PATH_ENV).ok_or(ConfigError::MissingVaultPath)?;
        let bib = pick(args.bib, BIB_PATH_ENV).unwrap_or_else(|| DEFAULT_BIB_PATH.to_string());
        let archive = pick(args.archive, ARCHIVE_PATH_ENV)
            .unwrap_or_else(|| DEFAULT_ARCHIVE_PATH.to_string());

        let papers_folder = args
            .papers_folder
            .unwrap_or_else(|| DEFAULT_PAPERS_FOLDER.to_string());
        let papers_folder = validate_relative_path(&papers_folder)
            .map_err(|e| ConfigError::InvalidPapersFolder {
                folder: papers_folder.clone(),
                reason: e.to_string(),
            })?
            .trim_end_matches('/')
            .to_string();
        if papers_folder.is_empty() {
            return Err(ConfigError::InvalidPapersFolder {
                folder: papers_folder,
                reason: "folder name is empty".to_string(),
            });
        }

        Ok(Self {
            vault_path: expand_tilde(&vault),
            papers_folder,
            bib_path: expand_tilde(&bib),
            archive_path: expand_tilde(&archive),
            sync: SyncSettings::default(),
        })
    }

    /// Check that the vault and the bibliography exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.vault_path.is_dir() {
            return Err(ConfigError::VaultNotFound(self.vault_path.clone()));
        }
        if !self.bib_path.is_file() {
            return Err(ConfigError::BibliographyNotFound(self.bib_path.clone()));
        }
        Ok(())
    }

    /// Directory holding the paper notes.
    pub fn papers_path(&self) -> PathBuf {
        self.vault_path.join(&self.papers_folder)
    }
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No vault configured. Pass --vault <path> or set OBSIDIAN_VAULT_PATH")]
    MissingVaultPath,

    #[error("Vault directory {} does not exist. Check --vault / OBSIDIAN_VAULT_PATH", display(.0))]
    VaultNotFound(PathBuf),

    #[error("Bibliography {} not found. Pass --bib <file> or set PAPER_SYNC_BIB", display(.0))]
    BibliographyNotFound(PathBuf),

    #[error("Invalid papers folder '{folder}': {reason}. Use a folder name relative to the vault")]
    InvalidPapersFolder { folder: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn resolve_with(args: ConfigArgs, env: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::resolve(args, |key| env.get(key).cloned())
    }

    #[test]
    fn test_missing_vault_path() {
        let result = resolve_with(ConfigArgs::default(), &[]);
        assert!(matches!(result, Err(ConfigError::MissingVaultPath)));

        let result = resolve_with(ConfigArgs::default(), &[(VAULT_PATH_ENV, "  ")]);
        assert!(matches!(result, Err(ConfigError::MissingVaultPath)));
    }

    #[test]
    fn test_defaults() {
        let config = resolve_with(ConfigArgs::default(), &[(VAULT_PATH_ENV, "/vault")]).unwrap();

        assert_eq!(config.vault_path, PathBuf::from("/vault"));
        assert_eq!(config.bib_path, PathBuf::from(DEFAULT_BIB_PATH));
        assert_eq!(config.archive_path, PathBuf::from(DEFAULT_ARCHIVE_PATH));
        assert_eq!(config.papers_path(), PathBuf::from("/vault/Papers"));
        assert_eq!(config.sync.removed_folder, "Removed Papers");
    }

    #[test]
    fn test_args_take_precedence_over_env() {
        let args = ConfigArgs {
            vault: Some("/from/args".into()),
            bib: Some("mine.bib".into()),
            archive: None,
            papers_folder: Some("Reading/Papers/".into()),
        };
        let env = [
            (VAULT_PATH_ENV, "/from/env"),
            (BIB_PATH_ENV, "env.bib"),
            (ARCHIVE_PATH_ENV, "env.json"),
        ];
        let config = resolve_with(args, &env).unwrap();

        assert_eq!(config.vault_path, PathBuf::from("/from/args"));
        assert_eq!(config.bib_path, PathBuf::from("mine.bib"));
        assert_eq!(config.archive_path, PathBuf::from("env.json"));
        assert_eq!(config.papers_folder, "Reading/Papers");
    }

    #[test]
    fn test_papers_folder_must_stay_in_vault() {
        for folder in ["../outside", "//absolute", ""] {
            let args = ConfigArgs {
                vault: Some("/vault".into()),
                papers_folder: Some(folder.into()),
                ..ConfigArgs::default()
            };
            let result = resolve_with(args, &[]);
            assert!(
                matches!(result, Err(ConfigError::InvalidPapersFolder { .. })),
                "{folder:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/vault"), home.join("vault"));
        }
        assert_eq!(expand_tilde("/abs/~/x"), PathBuf::from("/abs/~/x"));
    }

    #[test]
    fn test_validate() {
        let temp_dir = TempDir::new().unwrap();
        let vault = temp_dir.path().join("vault");
        let bib = temp_dir.path().join("refs.bib");

        let args = ConfigArgs {
            vault: Some(vault.display().to_string()),
            bib: Some(bib.display().to_string()),
            ..ConfigArgs::default()
        };
        let config = resolve_with(args, &[]).unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::VaultNotFound(_))));

        std::fs::create_dir(&vault).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::BibliographyNotFound(_))));

        std::fs::write(&bib, "").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_error_messages_say_how_to_fix() {
        let message = ConfigError::MissingVaultPath.to_string();
        assert!(message.contains("--vault"));
        assert!(message.contains(VAULT_PATH_ENV));

        let message = ConfigError::BibliographyNotFound(PathBuf::from("x.bib")).to_string();
        assert!(message.contains("x.bib"));
        assert!(message.contains("--bib"));
    }
}
