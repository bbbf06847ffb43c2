//! CLI configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sigvault_core::crypto::{self, KdfParams};
use sigvault_core::password::{PasswordPolicy, MIN_PASSWORD_LEN};
use sigvault_core::vault::VaultConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultSection,

    #[serde(default)]
    pub kdf: KdfSection,

    #[serde(default)]
    pub server: ServerSection,
}

/// Where the encrypted secret lives and how long it stays unlocked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    /// Directory holding `secret.vault`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Inactivity window before an unlocked secret is wiped (default: 5 minutes)
    #[serde(default = "default_auto_lock")]
    pub auto_lock_secs: u64,

    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            auto_lock_secs: default_auto_lock(),
            min_password_len: default_min_password_len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    #[default]
    Pbkdf2,
    Argon2id,
}

/// Password key-derivation settings.
///
/// Changing these after a secret is stored makes it undecryptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfSection {
    #[serde(default)]
    pub algorithm: KdfAlgorithm,

    /// PBKDF2 rounds
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Argon2id memory in KiB
    #[serde(default = "default_m_cost")]
    pub m_cost: u32,

    #[serde(default = "default_t_cost")]
    pub t_cost: u32,

    #[serde(default = "default_p_cost")]
    pub p_cost: u32,
}

impl Default for KdfSection {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::default(),
            iterations: default_iterations(),
            m_cost: default_m_cost(),
            t_cost: default_t_cost(),
            p_cost: default_p_cost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from(".sigvault")
}

fn default_auto_lock() -> u64 {
    300
}

fn default_min_password_len() -> usize {
    MIN_PASSWORD_LEN
}

fn default_iterations() -> u32 {
    crypto::MIN_PBKDF2_ITERATIONS
}

fn default_m_cost() -> u32 {
    crypto::ARGON2_M_COST
}

fn default_t_cost() -> u32 {
    crypto::ARGON2_T_COST
}

fn default_p_cost() -> u32 {
    crypto::ARGON2_P_COST
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SIGVAULT_DATA_DIR`
    /// - `SIGVAULT_AUTO_LOCK_SECS`
    /// - `SIGVAULT_LOG_LEVEL`
    /// - `SIGVAULT_KDF_ITERATIONS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SIGVAULT_DATA_DIR") {
            self.vault.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SIGVAULT_AUTO_LOCK_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                self.vault.auto_lock_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SIGVAULT_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("SIGVAULT_KDF_ITERATIONS") {
            if let Ok(iterations) = v.parse::<u32>() {
                self.kdf.iterations = iterations;
            }
        }
    }

    pub fn kdf_params(&self) -> Result<KdfParams> {
        let params = match self.kdf.algorithm {
            KdfAlgorithm::Pbkdf2 => KdfParams::pbkdf2(self.kdf.iterations),
            KdfAlgorithm::Argon2id => {
                KdfParams::argon2id(self.kdf.m_cost, self.kdf.t_cost, self.kdf.p_cost)
            }
        };
        params.context("Invalid [kdf] section")
    }

    pub fn vault_config(&self) -> Result<VaultConfig> {
        Ok(VaultConfig {
            kdf: self.kdf_params()?,
            auto_lock: Duration::from_secs(self.vault.auto_lock_secs),
            password_policy: PasswordPolicy::with_min_len(self.vault.min_password_len),
        })
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.vault.auto_lock_secs > 0,
            "vault.auto_lock_secs must be > 0"
        );

        anyhow::ensure!(
            self.vault.min_password_len >= MIN_PASSWORD_LEN,
            "vault.min_password_len must be >= {}",
            MIN_PASSWORD_LEN
        );

        anyhow::ensure!(
            !self.vault.data_dir.as_os_str().is_empty(),
            "vault.data_dir must not be empty"
        );

        self.kdf_params()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn full_toml() -> &'static str {
        r#"
[vault]
data_dir = "/custom/vault"
auto_lock_secs = 60
min_password_len = 12

[kdf]
algorithm = "argon2id"
m_cost = 32768
t_cost = 2
p_cost = 1

[server]
log_level = "debug"
"#
    }

    fn load(toml: &str) -> Config {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml).unwrap();
        Config::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_parse_empty_config() {
        let config = load("");
        assert_eq!(config.vault.data_dir, PathBuf::from(".sigvault"));
        assert_eq!(config.vault.auto_lock_secs, 300);
        assert_eq!(config.kdf.algorithm, KdfAlgorithm::Pbkdf2);
        assert_eq!(config.kdf.iterations, 100_000);
        assert_eq!(config.server.log_level, "info");
        assert!(config.validate().is_ok());
        assert_eq!(config.vault_config().unwrap(), VaultConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = load(full_toml());

        assert_eq!(config.vault.data_dir, PathBuf::from("/custom/vault"));
        assert_eq!(config.vault.auto_lock_secs, 60);
        assert_eq!(config.server.log_level, "debug");

        let vault = config.vault_config().unwrap();
        assert_eq!(vault.auto_lock, Duration::from_secs(60));
        assert_eq!(vault.password_policy.min_len, 12);
        assert_eq!(
            vault.kdf,
            KdfParams::Argon2id {
                m_cost: 32768,
                t_cost: 2,
                p_cost: 1
            }
        );
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[kdf]\nalgorithm = \"md5\"\n").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file(Path::new("/nonexistent/sigvault.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = load("");

        std::env::set_var("SIGVAULT_DATA_DIR", "/env/vault");
        std::env::set_var("SIGVAULT_AUTO_LOCK_SECS", "30");
        std::env::set_var("SIGVAULT_KDF_ITERATIONS", "250000");

        config.apply_env_overrides();

        assert_eq!(config.vault.data_dir, PathBuf::from("/env/vault"));
        assert_eq!(config.vault.auto_lock_secs, 30);
        assert_eq!(config.kdf.iterations, 250_000);

        std::env::remove_var("SIGVAULT_DATA_DIR");
        std::env::remove_var("SIGVAULT_AUTO_LOCK_SECS");
        std::env::remove_var("SIGVAULT_KDF_ITERATIONS");
    }

    #[test]
    fn test_validation_weak_iterations() {
        let config = load("[kdf]\niterations = 1000\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_auto_lock() {
        let config = load("[vault]\nauto_lock_secs = 0\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_short_password_minimum() {
        let config = load("[vault]\nmin_password_len = 4\n");
        assert!(config.validate().is_err());
    }
}
