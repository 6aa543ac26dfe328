
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{Config, ConfigError, ProviderConfig, ProviderMode};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Doc QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Choose where embeddings and answers are generated.");
    eprintln!();

    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_provider_connection(&config.provider)? {
        eprintln!("{}", style("✓ Provider connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the provider").yellow()
        );
        eprintln!("You can continue, but uploads will fall back to zero vectors until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());

        let config_path = config
            .config_file_path()
            .context("Failed to get config file path")?;
        eprintln!(
            "Configuration saved to: {}",
            style(config_path.display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    let provider = &config.provider;
    eprintln!("{}", style("Provider Settings:").bold().yellow());
    eprintln!("  Mode: {}", style(provider.mode).cyan());
    eprintln!("  Endpoint: {}", style(&provider.endpoint).cyan());
    eprintln!("  Embedding Model: {}", style(&provider.embedding_model).cyan());
    eprintln!("  Generation Model: {}", style(&provider.generation_model).cyan());
    eprintln!("  Embedding Dimension: {}", style(provider.embedding_dimension).cyan());
    eprintln!("  Max Concurrency: {}", style(provider.max_concurrency).cyan());
    eprintln!(
        "  API Key: {}",
        if provider.api_key.is_some() {
            style("set").green()
        } else {
            style("not set").dim()
        }
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.overlap).cyan());

    eprintln!();
    eprintln!("{}", style("Sessions & Retrieval:").bold().yellow());
    eprintln!("  Expiry: {}s", style(config.session.expiry_seconds).cyan());
    eprintln!("  Default Top-K: {}", style(config.retrieval.default_top_k).cyan());
    eprintln!("  Max Top-K: {}", style(config.retrieval.max_top_k).cyan());

    let config_path = config
        .config_file_path()
        .context("Failed to get config file path")?;
    eprintln!();
    eprintln!("Config file: {}", style(config_path.display()).dim());

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let modes: Vec<&str> = ProviderMode::ALL.iter().map(|mode| mode.as_str()).collect();
    let default_index = ProviderMode::ALL
        .iter()
        .position(|&mode| mode == provider.mode)
        .unwrap_or(0);

    let mode_index = Select::new()
        .with_prompt("Provider mode")
        .default(default_index)
        .items(&modes)
        .interact()?;
    provider.set_mode(ProviderMode::ALL[mode_index]);

    let endpoint: String = Input::new()
        .with_prompt("Endpoint")
        .default(provider.endpoint.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ProviderConfig {
                endpoint: input.clone(),
                ..provider.clone()
            };
            temp_config.endpoint_url()?;
            Ok(())
        })
        .interact_text()?;

    if provider.mode == ProviderMode::OpenRouter {
        let key = Password::new()
            .with_prompt("OpenRouter API key (leave empty to keep current)")
            .allow_empty_password(true)
            .interact()?;
        if !key.trim().is_empty() {
            provider.api_key = Some(key);
        }
    }

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(provider.generation_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(provider.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 8192")
            }
        })
        .interact_text()?;

    let max_concurrency: usize = Input::new()
        .with_prompt("Concurrent embedding requests")
        .default(provider.max_concurrency)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=64).contains(input) {
                Ok(())
            } else {
                Err("Concurrency must be between 1 and 64")
            }
        })
        .interact_text()?;

    provider.set_endpoint(endpoint)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_generation_model(generation_model)?;
    provider.set_embedding_dimension(dimension)?;
    provider.set_max_concurrency(max_concurrency)?;

    Ok(())
}

#[expect(clippy::ptr_arg, reason = "dialoguer validators receive &String")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

/// URL probed to check that the provider answers at all
fn probe_url(provider: &ProviderConfig) -> String {
    let base = provider.endpoint.trim().trim_end_matches('/');
    match provider.mode {
        ProviderMode::Ollama => format!("{base}/api/version"),
        ProviderMode::LmStudio | ProviderMode::OpenRouter => format!("{base}/models"),
    }
}

fn test_provider_connection(provider: &ProviderConfig) -> Result<bool> {
    let url = probe_url(provider);

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let mut request = agent.get(&url);
    if let Some(key) = &provider.api_key {
        request = request.header("Authorization", format!("Bearer {}", key.trim()));
    }

    match request.call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
