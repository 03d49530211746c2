//! CLI command implementations.

pub mod jobs;
pub mod run;

use anyhow::Result;
use asyncjobs_config::parse_system_config;

pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    match parse_system_config(&content) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  store:           {:?} (table {})", config.store.backend, config.store.table);
            println!("  timeout:         {}s", config.executor.timeout);
            println!("  max concurrency: {}", config.executor.max_concurrency);
            println!("  retry attempts:  {}", config.dispatch.retry_attempts);
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
