//! `summonbot config`: print the default configuration or its location.

use std::error::Error;
use std::path::Path;

use summonbot_config::AppConfig;

pub fn run(show_path: bool, config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    if show_path {
        println!("{}", super::config_file(config_path).display());
    } else {
        println!("{}", AppConfig::default_toml());
    }
    Ok(())
}
