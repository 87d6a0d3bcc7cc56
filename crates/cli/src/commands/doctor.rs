//! `summonbot doctor`: diagnose configuration.

use std::error::Error;
use std::path::Path;

use summonbot_core::Provider;
use summonbot_providers::OpenAiCompatProvider;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    println!("summonbot doctor");
    println!("================\n");

    let mut issues = 0;
    let path = super::config_file(config_path);
    if path.exists() {
        println!("  ✅ Config file found at {}", path.display());
    } else {
        println!("  ℹ️  No config file at {}, using defaults", path.display());
    }

    match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            let missing = config.required_missing();
            if missing.is_empty() {
                println!("  ✅ All required settings present");
            }
            for name in &missing {
                println!("  ❌ {name} is not set");
                issues += 1;
            }
            if let Ok(provider) = OpenAiCompatProvider::from_config(&config.provider) {
                match provider.health_check().await {
                    Ok(true) => println!("  ✅ {} reachable", provider.name()),
                    Ok(false) => {
                        println!("  ❌ {} rejected the API key", provider.name());
                        issues += 1;
                    }
                    Err(e) => {
                        println!("  ❌ {} unreachable: {e}", provider.name());
                        issues += 1;
                    }
                }
            }
            if !config.render.enabled {
                println!("  ℹ️  web_render disabled in configuration");
            } else if !cfg!(feature = "browser") {
                println!("  ⚠️  Built without the `browser` feature; web_render will report unavailable");
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }
    Ok(())
}
