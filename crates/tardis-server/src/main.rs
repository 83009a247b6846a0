//! Tardis archive CLI.
//!
//! # Usage
//!
//! ```bash
//! # Create an archive with one-hour keys
//! tardis --db archive.redb init --key-expires-secs 3600
//!
//! # Get a key, encrypt client-side, submit with a one-minute time-lock
//! tardis --caller alice gen-key --length 64
//! CT=$(tardis --caller alice encrypt "hello")
//! tardis --caller alice add "$CT" --release-in 60000
//!
//! # Read it back
//! tardis --caller bob get "$(tardis --caller alice last-id)"
//! ```
//!
//! Binary arguments are hex. Results are printed as JSON on stdout; logs go to
//! stderr.

use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tardis_core::{
    Address, ArchiveConfig, DEFAULT_CRYPT_BLOCK_SIZE, DEFAULT_KEY_EXPIRES_SECS, Environment,
};
use tardis_server::{ArchiveService, KeyView, MessageView, RedbStorage, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type Service = ArchiveService<SystemEnv, RedbStorage>;

/// Time-locked message archive
#[derive(Parser, Debug)]
#[command(name = "tardis")]
#[command(about = "Time-locked, per-sender-encrypted message archive")]
#[command(version)]
struct Args {
    /// Path to the archive database
    #[arg(long, global = true, default_value = "tardis.redb")]
    db: PathBuf,

    /// Address the request is made as
    #[arg(long, global = true)]
    caller: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new archive
    Init {
        /// Key lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_KEY_EXPIRES_SECS)]
        key_expires_secs: u64,

        /// Cipher feedback distance
        #[arg(long, default_value_t = DEFAULT_CRYPT_BLOCK_SIZE)]
        block_size: u64,
    },

    /// Issue a key for the caller unless a valid one exists
    GenKey {
        /// Requested key length (default 1024, max 10000)
        #[arg(long)]
        length: Option<usize>,

        /// Replace a still-valid key
        #[arg(long)]
        force: bool,
    },

    /// Show the caller's key
    GetKey,

    /// Encrypt UTF-8 text under the caller's key, printing hex ciphertext
    Encrypt {
        /// Plaintext
        text: String,
    },

    /// Submit hex ciphertext
    Add {
        /// Ciphertext as hex
        ciphertext: String,

        /// Absolute release time (epoch ms)
        #[arg(long, conflicts_with = "release_in", required_unless_present = "release_in")]
        release_at: Option<u64>,

        /// Release time relative to now (ms, raised to at least 1000)
        #[arg(long)]
        release_in: Option<u64>,

        /// Only list the message to its sender
        #[arg(long)]
        private: bool,
    },

    /// Look up a message by id
    Get {
        /// Message id
        id: u64,
    },

    /// Id of the caller's latest message
    LastId,

    /// Messages sent by an address, newest first
    Filter {
        /// Sender address
        address: String,
    },

    /// Latest released messages
    Recent {
        /// Maximum number of messages
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Only messages released after this time (epoch ms)
        #[arg(long)]
        after: Option<u64>,
    },

    /// Print the caller's address
    Echo,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let env = SystemEnv::new();
    let storage = RedbStorage::open(&args.db)?;

    if let Command::Init { key_expires_secs, block_size } = args.command {
        let config = ArchiveConfig { key_expires_secs, crypt_block_size: block_size };
        let service = Service::init(env, storage, config)?;
        return emit(service.state().config());
    }

    let caller = Address::new(args.caller.ok_or("--caller is required")?);
    let mut service = Service::open(env, storage)?;

    match args.command {
        Command::Init { .. } => Ok(()),
        Command::GenKey { length, force } => {
            service.generate_key(&caller, length, force)?;
            emit(&service.get_key(&caller).as_ref().map(KeyView::from))
        },
        Command::GetKey => emit(&service.get_key(&caller).as_ref().map(KeyView::from)),
        Command::Encrypt { text } => {
            let key = service.get_key(&caller).ok_or("no valid key, run gen-key first")?;
            let block_size = service.state().config().block_size();
            let ciphertext =
                tardis_crypto::encrypt(text.as_bytes(), key.value.as_bytes(), block_size);
            emit(&hex::encode(ciphertext))
        },
        Command::Add { ciphertext, release_at, release_in, private } => {
            let ciphertext = hex::decode(ciphertext.trim())?;
            let release_ts =
                resolve_release(service.env().wall_clock_millis(), release_at, release_in);
            let record = service.add_message(&caller, &ciphertext, release_ts, private)?;
            emit(&MessageView::from(&record))
        },
        Command::Get { id } => {
            let record = service.get_message_by_id(id)?;
            emit(&record.as_ref().map(MessageView::from))
        },
        Command::LastId => emit(&service.get_last_message_id(&caller).map(|id| id.get())),
        Command::Filter { address } => {
            let records = service.filter_by_address(&caller, &Address::new(address))?;
            emit(&records.iter().map(MessageView::from).collect::<Vec<_>>())
        },
        Command::Recent { count, after } => {
            let records = service.get_recent_messages(&caller, count, after);
            emit(&records.iter().map(MessageView::from).collect::<Vec<_>>())
        },
        Command::Echo => emit(&service.echo(&caller)),
    }
}

/// Minimum relative release delay.
///
/// The archive reads the clock again when it validates the release, so a
/// relative release must stay ahead of that second read.
const MIN_RELEASE_DELAY_MS: u64 = 1_000;

/// Absolute release time from the `add` flags, read against `now`.
fn resolve_release(now: u64, release_at: Option<u64>, release_in: Option<u64>) -> u64 {
    match release_at {
        Some(at) => at,
        None => now.saturating_add(release_in.unwrap_or_default().max(MIN_RELEASE_DELAY_MS)),
    }
}

#[allow(clippy::print_stdout)]
fn emit<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
