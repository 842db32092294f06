use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use kubewatch::k8s::watch::{KubeResourceClient, ResourceKind, WatchConfig, WatchManager};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info_span;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace to watch
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// Watch every namespace instead of one
    #[arg(short = 'A', long, conflicts_with = "namespace")]
    all_namespaces: bool,

    /// Resource kinds to watch
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = ResourceKind::ALL)]
    kinds: Vec<ResourceKind>,

    /// Log every watch event and show resource versions
    #[arg(long)]
    debug: bool,

    /// Write logs to this file (RUST_LOG controls the filter)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Upper bound for the reconnect backoff, in seconds
    #[arg(long)]
    max_backoff: Option<u64>,

    /// Print events as JSON lines instead of starting the terminal UI
    #[arg(long)]
    stream: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kubewatch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let namespace = if args.all_namespaces {
        String::new()
    } else {
        args.namespace.clone()
    };

    let mut config = WatchConfig {
        span: info_span!("kubewatch"),
        ..WatchConfig::default()
    };
    if let Some(secs) = args.max_backoff {
        config.backoff.max_delay = Duration::from_secs(secs.max(1));
    }

    let client = KubeResourceClient::try_default()
        .await
        .context("connecting to cluster")?;
    let manager = Arc::new(WatchManager::with_config(Arc::new(client), namespace, config));
    manager.set_debug_mode(args.debug).await;
    manager
        .start(&args.kinds)
        .await
        .context("starting watchers")?;

    let result = if args.stream {
        kubewatch::feed::print_feed(&manager)
            .await
            .context("printing watch feed")
    } else {
        kubewatch::tui::run(manager.clone())
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))
    };

    manager.stop().await;
    result
}
