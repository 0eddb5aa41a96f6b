use anyhow::{bail, Context, Result};
use chrono::Local;
use settlescraper::{config::Config, pipeline::Pipeline};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,settlescraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let config = Config::from_env().context("loading configuration")?;
    info!(
        reports = config.settings.reports.len(),
        endpoint = %config.base_endpoint,
        "configured"
    );

    // ─── 3) fetch + parse every report ───────────────────────────────
    let pipeline = Pipeline::from_config(&config).context("building HTTP client")?;
    let now = Local::now().naive_local();
    let summary = pipeline.run(now.date(), now).await;

    for f in &summary.failures {
        match f.data_set {
            Some(label) => warn!(fid = %f.fid, data_set = label.code(), "{}", f.error),
            None => warn!(fid = %f.fid, "{}", f.error),
        }
    }

    // ─── 4) hand the quotes on ───────────────────────────────────────
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.quotes.is_empty() {
        bail!("no settlement quotes retrieved");
    }
    info!("all done");
    Ok(())
}
