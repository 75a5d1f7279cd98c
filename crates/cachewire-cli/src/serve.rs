use crate::args::ConfigArgs;
use anyhow::Context;
use cachewire_core::{write_ndjson, Broker, BrokerConfig, BrokerStats, MemoryCacheStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Config file (or environment), then command-line overrides.
pub fn resolve_config(args: &ConfigArgs) -> anyhow::Result<BrokerConfig> {
    let mut config = match &args.config {
        Some(path) => BrokerConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BrokerConfig::from_env().context("invalid CACHEWIRE_* environment")?,
    };

    if let Some(scope) = &args.scope {
        config.scope = scope.clone();
    }
    if !args.preload.is_empty() {
        config.preload = args.preload.clone();
    }
    if let Some(capacity) = args.inbound_capacity {
        config.inbound_capacity = capacity;
    }
    if let Some(format) = args.log_format {
        config.log_format = format.into();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub async fn serve(config: &BrokerConfig) -> anyhow::Result<BrokerStats> {
    let origin = config.origin()?;
    let store = Arc::new(MemoryCacheStore::new());
    store
        .preload(&origin, config.preload.iter().cloned())
        .context("failed to preload caches")?;

    tracing::info!(%origin, preload = config.preload.len(), "serving cache broker on stdio");

    let (responses, outbound) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_ndjson(tokio::io::stdout(), outbound));
    let broker = Broker::new(store, origin, responses);
    let (tx, rx) = mpsc::channel(config.inbound_capacity);
    let reader = tokio::spawn(forward_lines(tokio::io::stdin(), tx));

    // `run` consumes the broker, closing the response channel on return.
    let stats = broker.run(rx).await;
    reader.await.context("stdin reader panicked")??;
    writer
        .await
        .context("stdout writer panicked")?
        .context("failed to write responses")?;
    Ok(stats)
}

/// Feed non-empty input lines to the broker until EOF or until the broker
/// stops listening.
async fn forward_lines<R>(input: R, tx: mpsc::Sender<String>) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(line).await.is_err() {
            break;
        }
    }
    Ok(())
}
