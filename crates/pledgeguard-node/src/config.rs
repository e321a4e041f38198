//! Node configuration
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. `pledgeguard.toml` (or the file named by `PLEDGEGUARD_CONFIG`), optional
//! 3. `PLEDGEGUARD_*` environment variables, `__` between nested keys
//!    (`PLEDGEGUARD_ORACLE__MIN_VOTES_REQUIRED=5`)
//! 4. `PORT`, which wins over everything for the listen port

use anyhow::{Context, Result};
use pledgeguard_common::crypto::AttestationVerifier;
use pledgeguard_escrow::EscrowConfig;
use pledgeguard_oracle::OracleParams;
use serde::{Deserialize, Serialize};

/// PledgeGuard node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// How often expired verification requests are finalized
    pub sweep_interval_ms: u64,
    /// Hex-encoded Ed25519 keys whose range attestations are accepted
    pub trusted_attesters: Vec<String>,
    pub escrow: EscrowConfig,
    pub oracle: OracleParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            log_json: false,
            sweep_interval_ms: 30_000,
            trusted_attesters: Vec::new(),
            escrow: EscrowConfig::default(),
            oracle: OracleParams::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let file =
            std::env::var("PLEDGEGUARD_CONFIG").unwrap_or_else(|_| "pledgeguard".to_string());
        let mut cfg: NodeConfig = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("PLEDGEGUARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        // Comma-separated lists; distinct names keep them out of the structured keys above
        if let Ok(admins) = std::env::var("PLEDGEGUARD_ADMIN_LIST") {
            cfg.escrow.admins = split_list(&admins);
        }
        if let Ok(keys) = std::env::var("PLEDGEGUARD_ATTESTER_KEYS") {
            cfg.trusted_attesters = split_list(&keys);
        }

        // Platform-assigned port takes priority
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse::<u16>() {
                cfg.port = p;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.escrow.validate()?;
        self.oracle.validate()?;
        if self.sweep_interval_ms == 0 {
            anyhow::bail!("sweep_interval_ms must be positive");
        }
        self.verifier()?;
        Ok(())
    }

    /// Proof verifier trusting the configured attesters
    pub fn verifier(&self) -> Result<AttestationVerifier> {
        AttestationVerifier::from_hex_keys(&self.trusted_attesters)
            .map_err(|e| anyhow::anyhow!("invalid trusted attester key: {e}"))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = NodeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8090");
        assert_eq!(cfg.verifier().unwrap().trusted_count(), 0);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" root, ops ,,"), vec!["root", "ops"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_rejects_bad_attester_key() {
        let cfg = NodeConfig {
            trusted_attesters: vec!["not-hex".to_string()],
            ..NodeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let cfg: NodeConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "port = 9000\n[oracle]\nmin_votes_required = 5\n[escrow]\nadmins = [\"root\"]\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.oracle.min_votes_required, 5);
        assert_eq!(cfg.oracle.node_reputation_threshold, 300);
        assert!(cfg.escrow.is_admin("root"));
        assert_eq!(cfg.sweep_interval_ms, 30_000);
    }
}
