use std::sync::Arc;

use clap::Parser;
use cortex_agent::{CognitiveLoop, LlmResponseGenerator};
use cortex_core::config::CortexConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cortex", about = "Runs the cognitive core's background loop and reads stdin as chat input")]
struct Args {
    /// Path to cortex.toml. Falls back to CORTEX_CONFIG, then ~/.cortex/cortex.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cortex_agent=info".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("CORTEX_CONFIG").ok());
    let config = CortexConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        CortexConfig::default()
    });

    let manifest_dir = std::path::PathBuf::from(&config.tools.manifest_dir);
    match cortex_tools::ToolRegistry::scan_manifests(&manifest_dir) {
        Ok(manifests) if !manifests.is_empty() => {
            info!(count = manifests.len(), dir = %manifest_dir.display(), "found tool manifests with no registered factory; skipping");
        }
        Ok(_) => {}
        Err(e) => warn!(dir = %manifest_dir.display(), error = %e, "could not scan tool manifest directory"),
    }

    let llm = Arc::new(cortex_llm::LanguageModelClient::new(config.llm.clone()));
    let response_generator = Arc::new(LlmResponseGenerator::new(llm));
    let spoken_output: Box<dyn Fn(String) + Send + Sync> = Box::new(|reply: String| {
        println!("{reply}");
    });

    let cognitive = Arc::new(CognitiveLoop::bootstrap(config, response_generator, spoken_output)?);

    let loop_handle = {
        let cognitive = cognitive.clone();
        tokio::spawn(async move { cognitive.run().await })
    };

    let stdin_handle = {
        let cognitive = cognitive.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            cognitive.process_user_message(line, None).await;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            cognitive.shutdown();
        }
        _ = stdin_handle => {
            info!("stdin closed, shutting down");
            cognitive.shutdown();
        }
    }

    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), loop_handle).await;
    Ok(())
}
