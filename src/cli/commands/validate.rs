//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use trading_broker::OkxCredentials;
use trading_config::AppConfig;

pub fn run(config_path: &Path, settings: Result<AppConfig>) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);
    if !config_path.exists() {
        println!("File not found, using built-in defaults");
    }

    let config = match settings {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {:#}", e);
            return Err(e);
        }
    };

    println!("Configuration is valid!");
    println!();
    println!("{}", toml::to_string_pretty(&config)?);

    let exchange = &config.exchange;
    match OkxCredentials::from_env(
        &exchange.api_key_env,
        &exchange.api_secret_env,
        &exchange.passphrase_env,
    ) {
        Ok(_) => println!("Exchange credentials: present"),
        Err(e) => println!("Exchange credentials: missing ({})", e),
    }
    println!(
        "Exchange mode: {}",
        if exchange.simulated { "simulated" } else { "live" }
    );

    Ok(())
}
