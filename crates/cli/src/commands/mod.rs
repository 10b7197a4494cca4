pub mod chat;
pub mod research;
pub mod serve;
pub mod transcribe;

use delve_config::AppConfig;
use delve_gateway::AppContext;
use std::path::Path;

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// Build the application context, failing early with setup help when no
/// completion key is configured.
pub async fn build_context(
    config: &AppConfig,
    ephemeral: bool,
) -> Result<AppContext, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DELVE_API_KEY   (generic)");
        eprintln!("    GEMINI_API_KEY  (Gemini, the default endpoint)");
        eprintln!("    OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let ctx = if ephemeral {
        AppContext::init_ephemeral(config)?
    } else {
        AppContext::init(config).await?
    };
    Ok(ctx)
}
