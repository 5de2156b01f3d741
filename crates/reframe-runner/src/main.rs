use anyhow::{bail, Context, Result};
use clap::Parser;
use reframe_runner::config::RunnerConfig;
use reframe_runner::observer::TracingObserver;
use reframe_runner::{preflight, BatchRunner};
use reframe_service::create_store;
use reframe_transform::CropScaleTransformer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RunnerConfig::parse();
    info!("reframe-runner starting");

    let store = create_store(&config.store_config())?;
    info!("store: {}", store.name());

    if config.list_fields {
        for field in store.list_attachment_fields().await? {
            println!("{}\t{}", field.field_id, field.display_name);
        }
        return Ok(());
    }

    let spec = config.transform_spec()?;
    let (Some(source_field), Some(target_field)) =
        (config.source_field.as_deref(), config.target_field.as_deref())
    else {
        bail!("--source-field and --target-field are required");
    };

    preflight::run_all(store.as_ref(), source_field, target_field).await?;

    let record_ids = if config.records.is_empty() {
        store
            .list_record_ids()
            .await
            .context("failed to list records")?
    } else {
        config.records.clone()
    };

    let downloader = config.downloader();
    let transformer = CropScaleTransformer;
    let observer = TracingObserver;
    let runner = BatchRunner::new(store.as_ref(), &downloader, &transformer, &observer);

    let report = runner
        .run(&record_ids, Some(source_field), Some(target_field), &spec)
        .await?;

    println!("{}", report.summary.status_message());
    if let Some(path) = &config.summary_json {
        report
            .write_json(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("run report written to {}", path.display());
    }
    Ok(())
}
