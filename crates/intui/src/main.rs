use std::sync::Arc;

use intui_core::config::Config;
use intui_openai::OpenAiClient;

#[tokio::main]
async fn main() -> Result<(), intui_core::Error> {
    intui_core::logging::init("intui")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!(error = %e, "refusing to start");
            return Err(e);
        }
    };

    let completion = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_base_url.clone(),
        cfg.model.clone(),
        cfg.completion_timeout,
    )?);

    intui_telegram::router::run_polling(cfg, completion)
        .await
        .map_err(|e| intui_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
