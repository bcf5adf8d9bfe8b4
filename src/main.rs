use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jenga_pgw::application::gateway::GatewayClient;
use jenga_pgw::application::reconciler::{CallbackReconciler, CallbackResponse, ResponseFormat};
use jenga_pgw::domain::callback::CallbackPayload;
use jenga_pgw::domain::config::{EndpointTable, Endpoints, Environment, GatewayConfig};
use jenga_pgw::domain::payment::PaymentRequest;
use jenga_pgw::domain::ports::TransactionStoreBox;
use jenga_pgw::domain::transaction::{StatusFilter, TransactionFilter};
use jenga_pgw::infrastructure::in_memory::InMemoryTransactionStore;
#[cfg(feature = "storage-rocksdb")]
use jenga_pgw::infrastructure::rocksdb::RocksDBStore;
use jenga_pgw::interfaces::csv::callback_reader::CallbackReader;
use jenga_pgw::interfaces::csv::transaction_writer::TransactionWriter;
use miette::{IntoDiagnostic, Result, miette};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Gateway settings, each with an environment variable fallback.
#[derive(Args)]
struct ConfigArgs {
    #[arg(long, global = true, env = "JENGA_ENVIRONMENT", default_value = "sandbox")]
    environment: Environment,

    #[arg(long, global = true, env = "JENGA_MERCHANT_CODE", default_value = "")]
    merchant_code: String,

    #[arg(long, global = true, env = "JENGA_CONSUMER_SECRET", default_value = "", hide_env_values = true)]
    consumer_secret: String,

    #[arg(long, global = true, env = "JENGA_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// PEM-encoded RSA private key used to sign payment requests.
    #[arg(long, global = true, env = "JENGA_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// File holding the PEM private key; used when no inline key is given.
    #[arg(long, global = true, env = "JENGA_PRIVATE_KEY_PATH")]
    private_key_path: Option<PathBuf>,

    #[arg(long, global = true, env = "JENGA_CALLBACK_URL")]
    callback_url: Option<String>,

    #[arg(long, global = true, env = "JENGA_SUCCESS_URL")]
    success_url: Option<String>,

    #[arg(long, global = true, env = "JENGA_FAILURE_URL")]
    failure_url: Option<String>,

    /// Log the hash carried by callbacks.
    #[arg(long, global = true, env = "JENGA_VERIFY_HASH")]
    verify_hash: bool,

    /// HTTP timeout in seconds.
    #[arg(long, global = true, env = "JENGA_TIMEOUT")]
    timeout: Option<u64>,

    /// Defaults to true in production, false in sandbox.
    #[arg(long, global = true, env = "JENGA_VERIFY_SSL")]
    verify_ssl: Option<bool>,

    #[arg(long, global = true, env = "JENGA_SANDBOX_TOKEN_URL")]
    sandbox_token_url: Option<String>,

    #[arg(long, global = true, env = "JENGA_SANDBOX_PAYMENT_URL")]
    sandbox_payment_url: Option<String>,

    #[arg(long, global = true, env = "JENGA_PRODUCTION_TOKEN_URL")]
    production_token_url: Option<String>,

    #[arg(long, global = true, env = "JENGA_PRODUCTION_PAYMENT_URL")]
    production_payment_url: Option<String>,
}

impl ConfigArgs {
    fn into_config(self) -> Result<GatewayConfig> {
        let private_key = match (self.private_key, self.private_key_path) {
            (Some(pem), _) => Some(pem),
            (None, Some(path)) => Some(std::fs::read_to_string(path).into_diagnostic()?),
            (None, None) => None,
        };

        let defaults = EndpointTable::default();
        let sandbox = Endpoints {
            token: self.sandbox_token_url.unwrap_or(defaults.sandbox.token),
            payment: self.sandbox_payment_url.unwrap_or(defaults.sandbox.payment),
        };
        let production = Endpoints {
            token: self.production_token_url.unwrap_or(defaults.production.token),
            payment: self
                .production_payment_url
                .unwrap_or(defaults.production.payment),
        };

        let mut builder = GatewayConfig::builder()
            .environment(self.environment)
            .merchant_code(self.merchant_code)
            .consumer_secret(self.consumer_secret)
            .api_key(self.api_key)
            .verify_hash(self.verify_hash)
            .endpoints(Environment::Sandbox, sandbox)
            .endpoints(Environment::Production, production);

        if let Some(pem) = private_key {
            builder = builder.private_key(pem);
        }
        if let Some(url) = self.callback_url {
            builder = builder.callback_url(url);
        }
        if let Some(url) = self.success_url {
            builder = builder.success_url(url);
        }
        if let Some(url) = self.failure_url {
            builder = builder.failure_url(url);
        }
        if let Some(seconds) = self.timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        if let Some(verify) = self.verify_ssl {
            builder = builder.verify_ssl(verify);
        }

        Ok(builder.build())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Validate a payment request and print the checkout form for it
    Initiate {
        /// JSON file holding the payment request
        request: PathBuf,
    },
    /// Handle one callback delivery
    Callback {
        /// JSON file holding the callback parameters
        payload: PathBuf,

        #[arg(long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },
    /// Replay recorded callback deliveries from a CSV file
    Replay {
        input: PathBuf,
    },
    /// Show the latest transaction recorded for an order
    Status {
        order_reference: String,
    },
    /// Export the transaction log as CSV
    Transactions {
        #[arg(long, value_enum, default_value_t = StatusArg::Any)]
        status: StatusArg,

        /// Earliest transaction date (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Latest transaction date (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        #[arg(long)]
        order_reference: Option<String>,
    },
    /// Print the current settings with secrets masked
    Settings,
    /// Check the credentials against the gateway
    TestConnection,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Browser,
}

impl From<FormatArg> for ResponseFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => ResponseFormat::Json,
            FormatArg::Browser => ResponseFormat::Browser,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Any,
    Successful,
    Failed,
}

impl From<StatusArg> for StatusFilter {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Any => StatusFilter::Any,
            StatusArg::Successful => StatusFilter::Successful,
            StatusArg::Failed => StatusFilter::Failed,
        }
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<TransactionStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryTransactionStore::new()))
        }
        None => Ok(Box::new(InMemoryTransactionStore::new())),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).into_diagnostic()?;
    serde_json::from_reader(file).into_diagnostic()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.into_config()?;

    match cli.command {
        Command::Initiate { request } => {
            let request: PaymentRequest = read_json(&request)?;
            let client = GatewayClient::new(config).into_diagnostic()?;
            let initiation = client.initiate_payment(&request).await.into_diagnostic()?;
            print_json(&initiation)?;
        }
        Command::Callback { payload, format } => {
            let payload: CallbackPayload = read_json(&payload)?;
            let reconciler = CallbackReconciler::new(open_store(cli.db_path)?, None, Arc::new(config));
            match reconciler.handle_and_respond(&payload, format.into()).await {
                CallbackResponse::Json { status, body } => {
                    print_json(&json!({ "status": status.as_u16(), "body": body }))?;
                }
                CallbackResponse::Redirect { location } => println!("{}", location),
            }
        }
        Command::Replay { input } => {
            let reconciler = CallbackReconciler::new(open_store(cli.db_path)?, None, Arc::new(config));
            let reader = CallbackReader::new(File::open(input).into_diagnostic()?);
            let mut handled = 0usize;
            for callback in reader.callbacks() {
                match callback {
                    Ok(payload) => {
                        let outcome = reconciler.handle(&payload).await;
                        println!("{}", serde_json::to_string(&outcome).into_diagnostic()?);
                        handled += 1;
                    }
                    Err(e) => error!(error = %e, "Error reading callback"),
                }
            }
            info!(handled, "Callback replay finished");
        }
        Command::Status { order_reference } => {
            let reconciler = CallbackReconciler::new(open_store(cli.db_path)?, None, Arc::new(config));
            let view = reconciler.status(&order_reference).await.into_diagnostic()?;
            print_json(&view)?;
        }
        Command::Transactions {
            status,
            from,
            to,
            order_reference,
        } => {
            let store = open_store(cli.db_path)?;
            let filter = TransactionFilter {
                status: status.into(),
                order_reference,
                from,
                to,
            };
            let records = store.list(&filter).await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = TransactionWriter::new(stdout.lock());
            writer.write_transactions(&records).into_diagnostic()?;
        }
        Command::Settings => print_json(&config.masked())?,
        Command::TestConnection => {
            let client = GatewayClient::new(config).into_diagnostic()?;
            let check = client.test_connection().await;
            print_json(&check)?;
            if !check.success {
                return Err(miette!("{}", check.message));
            }
        }
    }

    Ok(())
}
