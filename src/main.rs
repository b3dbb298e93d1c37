use std::env;
use std::process::ExitCode;

use etcd_watch_client::ClientConfig;
use etcd_watch_client::EtcdClient;
use etcd_watch_client::Error;
use etcd_watch_client::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: etcd-watch <host> <port> <key>";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    // Initializing Logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("etcd-watch stops: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let (host, port, key) = parse_args(env::args().skip(1).collect())?;
    let settings = ClientConfig::new()?;

    let client = EtcdClient::builder(host, port).set_config(settings).build()?;

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();
    let watch = client.spawn_watch(key.clone(), &shutdown, |updates| {
        for update in updates {
            if update.exists {
                println!("{}", update.node);
            } else {
                println!("[{}: deleted m: {}]", update.node.key, update.node.modified_index);
            }
        }
    });

    info!("Watching {}. Waiting for CTRL+C signal...", key);
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = graceful_shutdown(shutdown).await {
                error!("Failed to shutdown: {:?}", e);
            }
        }
    });

    match watch.wait().await {
        Error::Cancelled => {
            println!("Exiting program.");
            Ok(())
        }
        e => Err(e),
    }
}

fn parse_args(args: Vec<String>) -> Result<(String, u16, String)> {
    let [host, port, key] = <[String; 3]>::try_from(args)
        .map_err(|_| Error::invalid_argument(USAGE))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| Error::invalid_argument(format!("invalid port {port:?}: {e}")))?;
    Ok((host, port, key))
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    // an in-flight long poll still runs until it answers or times out
    shutdown.cancel();
    info!("Shutdown requested");
    Ok(())
}
