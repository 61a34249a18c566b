//! offsign CLI tool
//!
//! Drives an offline-signed storage upload from the command line: start the
//! upload, then sign and submit each batch or payment step the coordinator
//! asks for.

use clap::{Parser, Subcommand, ValueEnum};
use offsign::{
    ClientConfig, HttpExecutor, IdentityConfig, KeyMaterial, KeyType, PaymentFlow, PrivateKey,
    SessionBinder, StorageClient, TimeComponent, UploadOption, UploadSession,
};
use std::path::PathBuf;
use std::process;
use tracing::info;

/// offsign: offline signing for storage uploads
#[derive(Parser)]
#[command(name = "offsign")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node config file holding the identity (default: environment, then ~/.btfs/config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node API url (overrides BTFS_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Put the issue time in session tokens instead of the legacy placeholder
    #[arg(long)]
    wall_clock_tokens: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyKind {
    Ed25519,
    Secp256k1,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Upload mode
    #[arg(short, long)]
    mode: Option<String>,

    /// Comma-separated host ids
    #[arg(short = 's', long)]
    hosts: Option<String>,

    /// Storage period in days
    #[arg(long)]
    storage_length: Option<u64>,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Session id returned by upload-offline
    #[arg(long)]
    session: String,

    /// Hash of the uploaded file
    #[arg(long)]
    hash: String,

    /// Session status the step belongs to
    #[arg(long)]
    status: String,

    /// Upload timestamp (unix seconds) used when the session was started
    #[arg(long)]
    uts: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair and print it as a node config identity
    Keygen {
        /// Peer id to record
        #[arg(short, long)]
        peer_id: String,

        /// Key algorithm
        #[arg(short, long, value_enum, default_value = "secp256k1")]
        key_type: KeyKind,
    },

    /// Start an online upload
    Upload {
        /// File hash
        hash: String,
        #[command(flatten)]
        options: UploadArgs,
    },

    /// Start an offline-signed upload
    UploadOffline {
        /// File hash
        hash: String,
        #[command(flatten)]
        options: UploadArgs,
    },

    /// Show upload status
    Status {
        /// Session id
        id: String,
    },

    /// Fetch, sign and submit the next contract batch
    SignBatch {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Fetch, sign and submit unsigned data
    Sign {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Submit a balance attestation
    SignBalance {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Fetch the escrow key and submit a channel commit
    SignChannel {
        #[command(flatten)]
        session: SessionArgs,

        /// Amount committed to the channel
        #[arg(long)]
        total_price: i64,
    },

    /// Fetch the escrow result and submit a payin request
    SignPayin {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("offsign=info".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen { peer_id, key_type } => cmd_keygen(peer_id, *key_type),
        Commands::Upload { hash, options } => {
            let id = fail_on(client(&cli).upload(hash, &upload_options(options)).await);
            println!("{id}");
        }
        Commands::UploadOffline { hash, options } => {
            let uts = offsign::session::unix_timestamp();
            let id = fail_on(
                client(&cli)
                    .upload_offline(hash, &uts, &upload_options(options))
                    .await,
            );
            println!("{id}");
            println!("uts: {uts}");
        }
        Commands::Status { id } => {
            let storage = fail_on(client(&cli).upload_status(id).await);
            println!("{}", fail_on(serde_json::to_string_pretty(&storage)));
        }
        Commands::SignBatch { session } => {
            let client = client(&cli);
            let upload = upload_session(session);
            fail_on(client.sign_next_batch(&upload, &session.status).await);
            info!(session = %upload.id, "batch submitted");
        }
        Commands::Sign { session } => cmd_payment(&cli, session, PaymentFlow::Data).await,
        Commands::SignBalance { session } => cmd_payment(&cli, session, PaymentFlow::Balance).await,
        Commands::SignChannel {
            session,
            total_price,
        } => {
            let flow = PaymentFlow::PayChannel {
                total_price: *total_price,
            };
            cmd_payment(&cli, session, flow).await
        }
        Commands::SignPayin { session } => {
            cmd_payment(&cli, session, PaymentFlow::PayinRequest).await
        }
    }
}

fn fail_on<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    })
}

fn load_keys(cli: &Cli) -> KeyMaterial {
    let identity = match &cli.config {
        Some(path) => IdentityConfig::from_file(path),
        None => IdentityConfig::load(),
    };
    fail_on(fail_on(identity).into_key_material())
}

fn client(cli: &Cli) -> StorageClient<HttpExecutor> {
    let mut config = fail_on(ClientConfig::from_env());
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }

    let executor = fail_on(HttpExecutor::new(&config.api_url, config.timeout));
    let binder = SessionBinder::new(if cli.wall_clock_tokens {
        TimeComponent::WallClock
    } else {
        TimeComponent::Legacy
    });

    StorageClient::new(executor, load_keys(cli))
        .with_binder(binder)
        .with_deadline(config.timeout)
}

fn upload_options(args: &UploadArgs) -> Vec<UploadOption> {
    let mut options = Vec::new();
    if let Some(mode) = &args.mode {
        options.push(UploadOption::Mode(mode.clone()));
    }
    if let Some(hosts) = &args.hosts {
        options.push(UploadOption::Hosts(hosts.clone()));
    }
    if let Some(days) = args.storage_length {
        options.push(UploadOption::StorageLength(days));
    }
    options
}

fn upload_session(args: &SessionArgs) -> UploadSession {
    match &args.uts {
        Some(uts) => UploadSession::with_uts(&args.session, &args.hash, uts),
        None => UploadSession::new(&args.session, &args.hash),
    }
}

async fn cmd_payment(cli: &Cli, args: &SessionArgs, flow: PaymentFlow) {
    let client = client(cli);
    let session = upload_session(args);
    fail_on(client.sign_next_payment(&session, flow, &args.status).await);
    info!(session = %session.id, ?flow, "payment step submitted");
}

fn cmd_keygen(peer_id: &str, kind: KeyKind) {
    let key_type = match kind {
        KeyKind::Ed25519 => KeyType::Ed25519,
        KeyKind::Secp256k1 => KeyType::Secp256k1,
    };
    let private = fail_on(PrivateKey::generate(key_type));

    let identity = IdentityConfig {
        peer_id: peer_id.to_string(),
        public_key: private.public_key().to_base64(),
        private_key: private.to_base64(),
    };
    let document = serde_json::json!({ "Identity": identity });
    println!("{}", fail_on(serde_json::to_string_pretty(&document)));
    eprintln!();
    eprintln!("IMPORTANT: the private key above is unencrypted. Store it securely!");
}
