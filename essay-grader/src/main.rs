use anyhow::{Context, Result};
use essay_grader::{EssayGrader, GraderConfig, SAMPLE_ESSAY};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    let essay = match std::env::args().nth(1) {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read essay from {path}"))?,
        None => {
            tracing::info!("no essay path given, grading the bundled sample");
            SAMPLE_ESSAY.to_string()
        }
    };

    let config = GraderConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let model = config.chat_model()?;
    let grader =
        EssayGrader::new(model, config.settings()).context("failed to build grading graph")?;
    for (step, nodes) in grader.graph().supersteps().iter().enumerate() {
        tracing::info!(step, nodes = ?nodes, "planned superstep");
    }

    let state = grader.grade(&essay).await.context("grading failed")?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
