//! OMEMO conversation demo.
//!
//! Two devices, `alice` and `bob`, exchange device lists and bundles as
//! encoded documents, then take turns sending chat messages through the
//! output and input filters.
//!
//! # Usage
//!
//! ```bash
//! # In-memory stores
//! omemo-demo --messages 6
//!
//! # Persistent stores; a second run continues the same sessions
//! omemo-demo --db ./omemo-state
//! ```

use std::{path::Path, time::Duration};

use clap::Parser;
use omemo_core::{
    InputFilter, MemoryStore, Omemo, OmemoConfig, OmemoStore, OutputFilter, RedbStore, SystemEnv,
};
use omemo_proto::{BundleDocument, ChatMessage, DeviceListDocument, PeerId};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type Error = Box<dyn std::error::Error>;

/// OMEMO demo conversation
#[derive(Parser, Debug)]
#[command(name = "omemo-demo")]
#[command(about = "Run an end-to-end encrypted conversation between two devices")]
#[command(version)]
struct Args {
    /// Directory for persistent device stores (in-memory when omitted)
    #[arg(long)]
    db: Option<String>,

    /// Messages to exchange, alternating senders
    #[arg(short, long, default_value = "4")]
    messages: usize,

    /// One-time pre-keys per bundle
    #[arg(long, default_value = "10")]
    pre_keys: usize,

    /// Largest message gap bridged with skipped keys
    #[arg(long, default_value = "1000")]
    max_skip: u32,

    /// Cached skipped keys per session
    #[arg(long, default_value = "1000")]
    max_skipped_keys: usize,

    /// Lifetime of a cached skipped key, in seconds
    #[arg(long, default_value = "604800")]
    skipped_key_max_age: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> OmemoConfig {
        OmemoConfig {
            pre_key_count: self.pre_keys,
            max_skip: self.max_skip,
            max_skipped_keys: self.max_skipped_keys,
            skipped_key_max_age: Duration::from_secs(self.skipped_key_max_age),
        }
    }
}

struct Device<S: OmemoStore> {
    peer: PeerId,
    omemo: Omemo<S, SystemEnv>,
}

impl<S: OmemoStore> Device<S> {
    fn open(peer: &str, store: S, config: OmemoConfig) -> Result<Self, Error> {
        let omemo = Omemo::new(store, SystemEnv::new(), config)?;
        tracing::info!(peer, device = %omemo.device_id(), "device ready");
        Ok(Self { peer: PeerId::from(peer), omemo })
    }

    /// Learn `other`'s device list and bundle through their encoded forms.
    fn learn(&self, other: &Self) -> Result<(), Error> {
        let list = other.omemo.device_list(&other.peer).to_bytes()?;
        self.omemo.handle_device_list(&DeviceListDocument::from_bytes(&list)?)?;

        if let Some(bundle) = other.omemo.take_bundle_publish()? {
            let bytes = bundle.to_bytes()?;
            tracing::debug!(peer = %other.peer, len = bytes.len(), "bundle published");
            self.omemo.handle_bundle(&BundleDocument::from_bytes(&bytes)?)?;
        }
        Ok(())
    }
}

fn converse<S: OmemoStore>(
    alice: &Device<S>,
    bob: &Device<S>,
    messages: usize,
) -> Result<(), Error> {
    for turn in 0..messages {
        let (from, to) = if turn % 2 == 0 { (alice, bob) } else { (bob, alice) };

        let body = format!("message {turn} from {}", from.peer);
        let mut message = ChatMessage::new(from.peer.clone(), vec![to.peer.clone()], body);
        from.omemo.output(&mut message)?;

        let wire = message.encrypted.as_ref().map(|e| e.to_bytes()).transpose()?;
        tracing::info!(
            from = %from.peer,
            to = %to.peer,
            bytes = wire.as_ref().map_or(0, Vec::len),
            "sent"
        );

        to.omemo.input(&mut message)?;
        tracing::info!(peer = %to.peer, body = message.body.as_deref().unwrap_or(""), "received");

        // A consumed pre-key changes the bundle; republish it to the sender
        from.learn(to)?;
    }
    Ok(())
}

fn run<S: OmemoStore>(alice: S, bob: S, args: &Args) -> Result<(), Error> {
    let alice = Device::open("alice", alice, args.config())?;
    let bob = Device::open("bob", bob, args.config())?;

    alice.learn(&bob)?;
    bob.learn(&alice)?;

    converse(&alice, &bob, args.messages)
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match &args.db {
        Some(dir) => {
            let dir = Path::new(dir);
            std::fs::create_dir_all(dir)?;
            tracing::info!("Using persistent stores in {}", dir.display());
            let alice = RedbStore::open(dir.join("alice.redb"))?;
            let bob = RedbStore::open(dir.join("bob.redb"))?;
            run(alice, bob, &args)
        }
        None => run(MemoryStore::new(), MemoryStore::new(), &args),
    }
}
