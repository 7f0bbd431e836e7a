// # recond - Reconciler Daemon
//
// This daemon is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Registering API clients and tracked stores
// 4. Starting the convergence engine
//
// All reconciliation logic lives in recon-core; do not add resource or
// retry logic here.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Client
// - `RECON_CLIENT_TYPE`: Client type (exoscale)
// - `RECON_API_KEY`: API key
// - `RECON_API_SECRET`: API secret
// - `RECON_DNS_ENDPOINT`: DNS API base URL override (optional)
// - `RECON_COMPUTE_ENDPOINT`: Compute API base URL override (optional)
// - `RECON_MODE`: Set to `dry-run` to rehearse without mutating
//
// ### Resources
// - `RECON_RECORDS`: Comma-separated record declarations, each in the
//   form `name|domain|TYPE|content[|ttl[|prio]]`. Leave `name` empty
//   for an apex record.
// - `RECON_SECURITY_GROUPS`: Comma-separated group declarations, each
//   `name[:description]`
//
// ### State Store
// - `RECON_STATE_STORE_TYPE`: Type of tracked store (file, memory)
// - `RECON_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `RECON_MAX_RETRIES`: Maximum retry attempts per remote call
// - `RECON_RETRY_DELAY_SECS`: Delay between retries
// - `RECON_CONVERGE_INTERVAL_SECS`: Seconds between passes (0 = run
//   one pass and exit)
// - `RECON_PRUNE_UNDECLARED`: Delete tracked resources no longer
//   declared (default true)
//
// ## Example
//
// ```bash
// export RECON_API_KEY=EXOxxxxxxxxxxxxxxxxxxxxxxxx
// export RECON_API_SECRET=xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx
// export RECON_RECORDS='www|example.com|A|192.0.2.1|3600'
// export RECON_STATE_STORE_TYPE=file
// export RECON_STATE_STORE_PATH=/var/lib/recon/state.json
//
// recond
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use recon_core::{
    ClientConfig, ClientRegistry, ConvergeEngine, DesiredRecord, EngineConfig, ReconConfig,
    SecurityGroupSpec, StateStoreConfig,
};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ReconExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<ReconExitCode> for ExitCode {
    fn from(code: ReconExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    client_type: String,
    api_key: String,
    api_secret: String,
    dns_endpoint: Option<String>,
    compute_endpoint: Option<String>,
    records: Vec<String>,
    security_groups: Vec<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    max_retries: Option<usize>,
    retry_delay_secs: Option<u64>,
    converge_interval_secs: Option<u64>,
    prune_undeclared: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            client_type: env::var("RECON_CLIENT_TYPE").unwrap_or_else(|_| "exoscale".to_string()),
            api_key: env::var("RECON_API_KEY")?,
            api_secret: env::var("RECON_API_SECRET")?,
            dns_endpoint: env::var("RECON_DNS_ENDPOINT").ok(),
            compute_endpoint: env::var("RECON_COMPUTE_ENDPOINT").ok(),
            records: env::var("RECON_RECORDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            security_groups: env::var("RECON_SECURITY_GROUPS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            state_store_type: env::var("RECON_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            state_store_path: env::var("RECON_STATE_STORE_PATH").ok(),
            max_retries: env::var("RECON_MAX_RETRIES")
                .ok()
                .map(|s| s.parse().unwrap_or(3)),
            retry_delay_secs: env::var("RECON_RETRY_DELAY_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(5)),
            converge_interval_secs: env::var("RECON_CONVERGE_INTERVAL_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(0)),
            prune_undeclared: env::var("RECON_PRUNE_UNDECLARED")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
            log_level: env::var("RECON_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// This performs comprehensive validation including:
    /// - Required field presence
    /// - Value format validation (credentials, domain names)
    /// - Numeric range validation
    /// - Type enumeration validation
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!(
                "RECON_API_KEY is required. \
                Set it via: export RECON_API_KEY=your_key"
            );
        }

        if self.api_secret.is_empty() {
            anyhow::bail!(
                "RECON_API_SECRET is required. \
                Set it via: export RECON_API_SECRET=your_secret"
            );
        }

        // Check for obvious placeholder credentials (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.contains("your_key")
            || key_lower.contains("replace_me")
            || key_lower.contains("example")
            || key_lower == "key"
        {
            anyhow::bail!(
                "RECON_API_KEY appears to be a placeholder. \
                Use an actual API key from your cloud provider."
            );
        }

        // Validate client type
        match self.client_type.as_str() {
            "exoscale" => {} // Currently supported
            _ => anyhow::bail!(
                "RECON_CLIENT_TYPE '{}' is not supported. \
                Supported clients: exoscale",
                self.client_type
            ),
        }

        // Validate state store type
        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "RECON_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        // At least one resource must be declared
        if self.records.is_empty() && self.security_groups.is_empty() {
            anyhow::bail!(
                "At least one of RECON_RECORDS or RECON_SECURITY_GROUPS must be set. \
                Example: export RECON_RECORDS='www|example.com|A|192.0.2.1'"
            );
        }

        for entry in &self.records {
            let record = parse_record_entry(entry)?;
            validate_domain_name(&record.domain)?;
        }

        // Validate state store path for file store
        if self.state_store_type == "file" {
            if let Some(ref path) = self.state_store_path {
                if path.is_empty() {
                    anyhow::bail!(
                        "RECON_STATE_STORE_PATH cannot be empty when RECON_STATE_STORE_TYPE=file"
                    );
                }

                // Check parent directory exists
                if let Some(parent) = std::path::Path::new(path).parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    anyhow::bail!(
                        "RECON_STATE_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
            } else {
                anyhow::bail!(
                    "RECON_STATE_STORE_PATH is required when RECON_STATE_STORE_TYPE=file. \
                    Set it via: export RECON_STATE_STORE_PATH=/var/lib/recon/state.json"
                );
            }
        }

        // Validate numeric ranges
        if let Some(max_retries) = self.max_retries
            && (max_retries == 0 || max_retries > 10)
        {
            anyhow::bail!(
                "RECON_MAX_RETRIES must be between 1 and 10. Got: {}",
                max_retries
            );
        }

        if let Some(retry_delay) = self.retry_delay_secs
            && (!(1..=300).contains(&retry_delay))
        {
            anyhow::bail!(
                "RECON_RETRY_DELAY_SECS must be between 1 and 300 seconds. Got: {}",
                retry_delay
            );
        }

        if let Some(interval) = self.converge_interval_secs
            && interval != 0
            && !(10..=86400).contains(&interval)
        {
            anyhow::bail!(
                "RECON_CONVERGE_INTERVAL_SECS must be 0 (one-shot) or between \
                10 and 86400 seconds. Got: {}",
                interval
            );
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "RECON_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Assemble the core configuration from the validated environment
    fn to_recon_config(&self) -> Result<ReconConfig> {
        let mut engine = EngineConfig::default();
        if let Some(max_retries) = self.max_retries {
            engine.max_retries = max_retries;
        }
        if let Some(retry_delay) = self.retry_delay_secs {
            engine.retry_delay_secs = retry_delay;
        }
        if let Some(interval) = self.converge_interval_secs {
            engine.converge_interval_secs = interval;
        }
        engine.prune_undeclared = self.prune_undeclared;

        let records = self
            .records
            .iter()
            .map(|entry| parse_record_entry(entry).map(recon_core::config::RecordSpec::new))
            .collect::<Result<Vec<_>>>()?;

        let security_groups = self
            .security_groups
            .iter()
            .map(|entry| parse_group_entry(entry))
            .collect::<Vec<_>>();

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                // validate() guarantees the path is set for file stores
                path: self.state_store_path.clone().unwrap_or_default(),
            },
        };

        Ok(ReconConfig {
            client: ClientConfig::Exoscale {
                api_key: self.api_key.clone(),
                api_secret: self.api_secret.clone(),
                dns_endpoint: self.dns_endpoint.clone(),
                compute_endpoint: self.compute_endpoint.clone(),
            },
            state_store,
            records,
            security_groups,
            engine,
        })
    }
}

/// Parse one `name|domain|TYPE|content[|ttl[|prio]]` record declaration
fn parse_record_entry(entry: &str) -> Result<DesiredRecord> {
    let fields: Vec<&str> = entry.split('|').map(str::trim).collect();

    if fields.len() < 4 || fields.len() > 6 {
        anyhow::bail!(
            "Record declaration '{}' is malformed. \
            Expected: name|domain|TYPE|content[|ttl[|prio]]",
            entry
        );
    }

    let record_type = fields[2]
        .parse()
        .map_err(|e| anyhow::anyhow!("Record declaration '{}': {}", entry, e))?;

    let ttl = match fields.get(4) {
        Some(s) if !s.is_empty() => Some(s.parse::<i64>().map_err(|_| {
            anyhow::anyhow!("Record declaration '{}' has a non-numeric ttl: {}", entry, s)
        })?),
        _ => None,
    };

    let prio = match fields.get(5) {
        Some(s) if !s.is_empty() => Some(s.parse::<i64>().map_err(|_| {
            anyhow::anyhow!(
                "Record declaration '{}' has a non-numeric priority: {}",
                entry,
                s
            )
        })?),
        _ => None,
    };

    Ok(DesiredRecord {
        domain: fields[1].to_string(),
        name: fields[0].to_string(),
        record_type,
        content: fields[3].to_string(),
        ttl,
        prio,
    })
}

/// Parse one `name[:description]` security-group declaration
fn parse_group_entry(entry: &str) -> SecurityGroupSpec {
    let (name, description) = match entry.split_once(':') {
        Some((name, description)) => (name.trim(), description.trim()),
        None => (entry.trim(), ""),
    };

    SecurityGroupSpec {
        name: name.to_string(),
        description: description.to_string(),
        tags: Default::default(),
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    // Split into labels and validate each
    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Check for valid characters (alphanumeric and hyphen)
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        // Label cannot start or end with hyphen
        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ReconExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ReconExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReconExitCode::ConfigError.into();
    }

    info!("Starting recond daemon");
    info!(
        "Configuration loaded: {} record(s), {} security group(s)",
        config.records.len(),
        config.security_groups.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReconExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            ReconExitCode::RuntimeError
        } else {
            ReconExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
///
/// In interval mode the engine keeps converging until SIGTERM or
/// SIGINT arrives; tracked state is flushed before exit.
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ClientRegistry::new();

    // Register built-in clients and stores
    #[cfg(feature = "exoscale")]
    {
        info!("Registering Exoscale client");
        recon_provider_exoscale::register(&registry);
    }

    registry.register_state_store("memory", Box::new(recon_core::state::MemoryTrackedStoreFactory));
    registry.register_state_store("file", Box::new(recon_core::state::FileTrackedStoreFactory));

    let recon_config = config.to_recon_config()?;

    info!("Client type: {}", config.client_type);
    info!("State store type: {}", config.state_store_type);

    for spec in &recon_config.records {
        info!("Managing record: {}", spec.tracking_key());
    }
    for group in &recon_config.security_groups {
        info!("Managing security group: {}", group.name);
    }

    let dns = registry.create_dns_client(&recon_config.client)?;
    let compute = registry.create_compute_client(&recon_config.client)?;
    let store = registry.create_state_store(&recon_config.state_store).await?;

    let (engine, mut events) = ConvergeEngine::new(dns, compute, store, recon_config)?;

    // Drain engine events into the log
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("Engine event: {:?}", event);
        }
    });

    info!("Starting convergence engine");
    engine.run().await?;

    event_task.abort();
    info!("Shutting down daemon");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::RecordType;

    #[test]
    fn test_parse_record_entry_full() {
        let record = parse_record_entry("www|example.com|A|192.0.2.1|3600|0").unwrap();
        assert_eq!(record.name, "www");
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.record_type, RecordType::A);
        assert_eq!(record.content, "192.0.2.1");
        assert_eq!(record.ttl, Some(3600));
        assert_eq!(record.prio, Some(0));
    }

    #[test]
    fn test_parse_record_entry_apex_with_defaults() {
        let record = parse_record_entry("|example.com|MX|mail.example.com").unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.record_type, RecordType::Mx);
        assert_eq!(record.ttl, None);
        assert_eq!(record.prio, None);
    }

    #[test]
    fn test_parse_record_entry_rejects_bad_type() {
        assert!(parse_record_entry("www|example.com|PTR|host").is_err());
    }

    #[test]
    fn test_parse_record_entry_rejects_missing_fields() {
        assert!(parse_record_entry("www|example.com").is_err());
    }

    #[test]
    fn test_parse_group_entry() {
        let group = parse_group_entry("web: HTTP and HTTPS traffic");
        assert_eq!(group.name, "web");
        assert_eq!(group.description, "HTTP and HTTPS traffic");

        let bare = parse_group_entry("db");
        assert_eq!(bare.name, "db");
        assert_eq!(bare.description, "");
    }

    #[test]
    fn test_validate_domain_name() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("sub-domain.example.com").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("bad..label.com").is_err());
        assert!(validate_domain_name("-leading.example.com").is_err());
    }
}
