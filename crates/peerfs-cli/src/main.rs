//! PeerFS CLI
//!
//! Publish a file to a swarm of peers, or collect one by its tag.

mod config;
mod progress;

use clap::{Args, Parser, Subcommand};
use console::style;
use peerfs_core::{
    PeerId, SessionConfig, SessionEvent, SessionHandle, SessionState, Swarm, Tag, Transport,
};
use peerfs_transport::TcpMesh;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

use config::Config;
use progress::{BlockProgress, format_bytes, format_duration};

/// PeerFS - password-protected file distribution over a peer swarm
#[derive(Parser)]
#[command(name = "peerfs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a file and print its tag
    Pub {
        /// File to publish
        filename: PathBuf,

        /// Password the file is encrypted with
        password: String,

        #[command(flatten)]
        network: NetworkArgs,
    },

    /// Collect a file by tag, then keep reseeding until it is restored
    Get {
        /// Tag printed by the publisher
        tag: Tag,

        /// Password the file was published with
        password: String,

        /// Where to write the restored file
        #[arg(short, long)]
        filename: Option<PathBuf>,

        #[command(flatten)]
        network: NetworkArgs,
    },
}

#[derive(Args)]
struct NetworkArgs {
    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Peer to dial; repeatable, added to the configured peers
    #[arg(short, long = "peer")]
    peers: Vec<SocketAddr>,

    /// Delay between two outgoing blocks, in milliseconds
    #[arg(short, long)]
    rate: Option<u64>,
}

/// A bound TCP mesh plus a swarm over it
struct Node {
    mesh: Arc<TcpMesh>,
    swarm: Swarm,
    peers: Vec<SocketAddr>,
}

impl Node {
    async fn open(args: &NetworkArgs, config: &Config) -> anyhow::Result<Self> {
        let listen = match args.listen {
            Some(addr) => addr,
            None => config.parse_listen_addr()?,
        };
        let pace = args
            .rate
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.pace_interval());

        let mut peers = config.parse_peers()?;
        peers.extend(args.peers.iter().copied());

        let mesh = Arc::new(TcpMesh::bind(listen, PeerId::random()?).await?);
        tracing::info!(
            peer = %mesh.local_id(),
            addr = %mesh.local_addr(),
            "Listening for peers"
        );

        let transport: Arc<dyn Transport> = mesh.clone();
        let swarm = Swarm::new(transport, SessionConfig::default().with_pace_interval(pace));

        Ok(Self { mesh, swarm, peers })
    }

    /// Dial the peer list; unreachable peers are logged and skipped
    async fn dial_peers(&self) {
        for addr in &self.peers {
            match self.mesh.dial(*addr).await {
                Ok(peer) => tracing::info!(peer = %peer, addr = %addr, "Connected"),
                Err(e) => tracing::warn!(addr = %addr, error = %e, "Failed to dial peer"),
            }
        }
    }

    async fn close(self, handle: SessionHandle) -> anyhow::Result<()> {
        handle.shutdown().await?;
        self.mesh.close();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Pub {
            filename,
            password,
            network,
        } => {
            publish(filename, password, network, &config).await?;
        }
        Commands::Get {
            tag,
            password,
            filename,
            network,
        } => {
            let output =
                filename.unwrap_or_else(|| config.transfer.default_output.join(tag.to_hex()));
            download(tag, output, password, network, &config).await?;
        }
    }

    Ok(())
}

/// Publish `filename` and seed it until interrupted
async fn publish(
    filename: PathBuf,
    password: String,
    network: NetworkArgs,
    config: &Config,
) -> anyhow::Result<()> {
    if !filename.exists() {
        anyhow::bail!("File not found: {}", filename.display());
    }
    let file_size = std::fs::metadata(&filename)?.len();

    let node = Node::open(&network, config).await?;
    let handle = node.swarm.publish(&filename, &password)?;
    let tag = handle.ready().await?;
    let status = handle.status();

    eprintln!(
        "Publishing {} ({}, {} blocks)",
        filename.display(),
        format_bytes(file_size),
        status.block_count
    );
    println!("{}", style(tag).bold());

    handle.start().await?;
    node.dial_peers().await;

    let mut events = handle.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Publishing { block, peer }) => {
                    tracing::info!(block, peer = %peer, "Published block");
                }
                Ok(SessionEvent::Error { error }) => {
                    tracing::warn!(error = %error, "Session error");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    node.close(handle).await
}

/// Collect the file tagged `tag` into `output`
async fn download(
    tag: Tag,
    output: PathBuf,
    password: String,
    network: NetworkArgs,
    config: &Config,
) -> anyhow::Result<()> {
    let node = Node::open(&network, config).await?;
    let handle = node.swarm.download(tag, &output, &password)?;
    handle.ready().await?;
    handle.start().await?;
    node.dial_peers().await;

    let started = Instant::now();
    let progress = BlockProgress::new(&tag.to_hex());
    let mut status = handle.watch();

    let outcome = loop {
        let snapshot = status.borrow_and_update().clone();
        progress.update(snapshot.written, snapshot.block_count);
        match snapshot.state {
            SessionState::Finished => break Ok(()),
            SessionState::Failed => {
                break Err(snapshot
                    .error
                    .map(anyhow::Error::from)
                    .unwrap_or_else(|| anyhow::anyhow!("download failed")));
            }
            _ => {}
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break Err(anyhow::anyhow!("interrupted"));
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break Err(anyhow::anyhow!("session ended unexpectedly"));
                }
            }
        }
    };

    match &outcome {
        Ok(()) => progress.finish_with_message(format!(
            "{} {} in {}",
            style("Restored").green(),
            output.display(),
            format_duration(started.elapsed())
        )),
        Err(_) => progress.abandon(),
    }

    node.close(handle).await?;
    outcome
}
