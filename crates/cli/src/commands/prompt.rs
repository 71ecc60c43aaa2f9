//! `minerva prompt`: Print the rendered system prompt.

use minerva_config::AppConfig;
use minerva_session::render_system_prompt;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let tools = minerva_tools::default_registry();
    println!(
        "{}",
        render_system_prompt(&config.identity, &tools, config.session.max_tool_use_count)
    );
    Ok(())
}
