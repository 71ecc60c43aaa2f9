//! `minerva chat`: Talk to the assistant in the terminal.

use std::sync::Arc;

use minerva_channels::{CliChannel, CliSettings};
use minerva_config::AppConfig;
use minerva_core::channel::Channel;
use minerva_core::token::HeuristicTokenCounter;
use minerva_session::{SessionRegistry, SessionServices, SessionSettings, render_system_prompt};
use tracing::info;

pub async fn run(username: String, always_respond: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    MINERVA_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = minerva_providers::build_from_config(&config)?;
    let tools = minerva_tools::default_registry();
    let prompt = render_system_prompt(&config.identity, &tools, config.session.max_tool_use_count);

    let identity = &config.identity;
    let settings = CliSettings {
        username,
        ai_mention: identity.mention(&identity.ai_username),
        ai_name: identity.ai_name.clone(),
        always_respond,
        download_dir: std::env::current_dir()?,
    };
    let mention = settings.ai_mention.clone();
    let channel = Arc::new(CliChannel::new(settings));

    let services = SessionServices {
        provider: Arc::new(provider),
        channel: channel.clone(),
        tools: Arc::new(tools),
        counter: Arc::new(HeuristicTokenCounter),
        settings: Arc::new(SessionSettings::from_config(&config)),
        prompt: Arc::from(prompt),
    };
    let registry = SessionRegistry::new(services);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Minerva — Interactive Chat          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Assistant: {} ({mention})", config.identity.ai_name);
    if always_respond {
        println!("  Every line gets an answer.");
    } else {
        println!("  Mention {mention} to get an answer.");
    }
    println!("  Attach an image with /image <path> [caption].");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    info!(model = %config.model, "Chat started");
    registry.run(rx).await;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
