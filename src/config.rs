//! Environment-variable-driven configuration for the `hdrp-engine-server`
//! binary, parsed with `clap`'s `env` feature so every setting can also be
//! passed as a flag. Every field has a default, so omitting all environment
//! variables still produces a working local configuration.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "hdrp-engine-server", version, about = "Durable DAG execution engine")]
pub struct Config {
    #[arg(long, env = "HDRP_PRINCIPAL_ADDR", default_value = "http://localhost:9000")]
    pub principal_addr: String,

    #[arg(long, env = "HDRP_RESEARCHER_ADDR", default_value = "http://localhost:9001")]
    pub researcher_addr: String,

    #[arg(long, env = "HDRP_CRITIC_ADDR", default_value = "http://localhost:9002")]
    pub critic_addr: String,

    #[arg(long, env = "HDRP_SYNTHESIZER_ADDR", default_value = "http://localhost:9003")]
    pub synthesizer_addr: String,

    #[arg(long, env = "HDRP_DB_PATH", default_value = "./data/orchestrator.db")]
    pub db_path: String,

    #[arg(long, env = "MAX_WORKERS", default_value_t = 10)]
    pub max_workers: usize,

    #[arg(long, env = "RESEARCHER_RATE_LIMIT", default_value_t = 5)]
    pub researcher_rate_limit: usize,

    #[arg(long, env = "CRITIC_RATE_LIMIT", default_value_t = 3)]
    pub critic_rate_limit: usize,

    #[arg(long, env = "SYNTHESIZER_RATE_LIMIT", default_value_t = 2)]
    pub synthesizer_rate_limit: usize,

    #[arg(long, env = "LOCK_PROVIDER", default_value = "memory")]
    pub lock_provider: String,

    #[arg(long, env = "LOCK_TIMEOUT", default_value_t = 30)]
    pub lock_timeout_secs: u64,

    #[arg(long, env = "NODE_EXECUTION_TIMEOUT", default_value_t = 300)]
    pub node_execution_timeout_secs: u64,

    #[arg(long, env = "HDRP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "HDRP_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,
}

impl Config {
    pub fn node_execution_timeout(&self) -> Duration {
        Duration::from_secs(self.node_execution_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn rate_limits(&self) -> std::collections::HashMap<String, usize> {
        let mut limits = std::collections::HashMap::new();
        limits.insert("researcher".to_string(), self.researcher_rate_limit);
        limits.insert("critic".to_string(), self.critic_rate_limit);
        limits.insert("synthesizer".to_string(), self.synthesizer_rate_limit);
        limits
    }
}

impl Default for Config {
    fn default() -> Self {
        // `Parser::parse_from` with only the program name falls through to
        // every `default_value`/`env` default, the same way the teacher's
        // CLI binaries support running with no flags for local development.
        Config::parse_from(["hdrp-engine-server"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_working_config() {
        let config = Config::default();
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.rate_limits()["researcher"], 5);
    }
}
