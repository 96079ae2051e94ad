// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! chimera gateway binary.

use anyhow::{bail, Context, Result};
use chimera::authority::warrant::WarrantVerifier;
use chimera::authority::{CredentialAuthority, Keyring};
use chimera::classifier::{RemoteClassifier, RiskClassifier, RuleClassifier};
use chimera::config::Config;
use chimera::engine_core::interceptor::Interceptor;
use chimera::engine_core::ledger::{self, Ledger};
use chimera::engine_core::sanitizer::ResponseSanitizer;
use chimera::engine_core::session::SessionStore;
use chimera::exec::{ExecutionEnvironment, ScenarioConfig};
use chimera::mcp::backend::{Backend, HttpBackend, InProcessBackend};
use chimera::mcp::gateway::Gateway;
use chimera::mcp::{http, transport};
use chimera::utils::policy_loader::PolicyLoader;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Stdio,
    Http,
}

#[derive(Parser)]
#[command(name = "chimera", version, about = "Transparent deception gateway for MCP tool calls")]
struct Cli {
    /// Agent-facing transport binding
    #[arg(long, value_enum, default_value = "stdio")]
    transport: TransportKind,

    /// Policy manifest path (overrides CHIMERA_POLICY_PATH)
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Scenario path for the in-process execution environment
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Key directory holding the two keypairs
    #[arg(long)]
    keys_dir: Option<PathBuf>,

    /// Ledger file path
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// HTTP transport port
    #[arg(long)]
    port: Option<u16>,

    /// Forward tool calls to a remote execution environment instead of the
    /// in-process one
    #[arg(long)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute the ledger hash chain and report the verified entry count
    VerifyLedger { path: PathBuf },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::VerifyLedger { path }) = &cli.command {
        let count = ledger::verify_chain(path)
            .with_context(|| format!("ledger verification failed for {}", path.display()))?;
        println!("ledger ok: {count} entries verified");
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if let Some(policy) = cli.policy {
        config.policy_path = Some(policy);
    }
    if let Some(scenario) = cli.scenario {
        config.scenario_path = Some(scenario);
    }
    if let Some(keys_dir) = cli.keys_dir {
        config.keys_dir = keys_dir;
    }
    if let Some(ledger_path) = cli.ledger {
        config.ledger_path = ledger_path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(backend_url) = cli.backend_url {
        config.backend_url = Some(backend_url);
    }

    init_tracing(&config);

    let Some(policy_path) = &config.policy_path else {
        bail!("no policy manifest configured (--policy or CHIMERA_POLICY_PATH)");
    };
    let (manifest, policy_digest) = PolicyLoader::load(policy_path)?;
    info!(digest = %policy_digest, "policy manifest loaded");

    let sanitizer = Arc::new(ResponseSanitizer::with_rules(&manifest.sanitizer)?);
    let manifest = Arc::new(manifest);

    let keyring = Keyring::load(&config.keys_dir, &config.prime_kid, &config.shadow_kid)?;
    let authority = Arc::new(CredentialAuthority::new(keyring));

    let backend: Arc<dyn Backend> = if let Some(url) = &config.backend_url {
        info!(%url, "forwarding tool calls to remote execution environment");
        Arc::new(HttpBackend::new(url.clone()))
    } else {
        let Some(scenario_path) = &config.scenario_path else {
            bail!("no scenario configured (--scenario or CHIMERA_SCENARIO_PATH) and no --backend-url");
        };
        let scenario = Arc::new(ScenarioConfig::load(scenario_path)?);

        // In-process deployment: each plane's verifier still only holds its
        // own public key, so the disjoint-verifier contract is preserved.
        let prime_pub = std::fs::read(config.keys_dir.join("prime.pub.pem"))?;
        let shadow_pub = std::fs::read(config.keys_dir.join("shadow.pub.pem"))?;
        let environment = ExecutionEnvironment::new(
            scenario,
            WarrantVerifier::from_public_pem(&config.prime_kid, &prime_pub)?,
            WarrantVerifier::from_public_pem(&config.shadow_kid, &shadow_pub)?,
        );
        Arc::new(InProcessBackend::new(Arc::new(environment)))
    };

    let classifier: Arc<dyn RiskClassifier> = match &config.classifier_endpoint {
        Some(endpoint) => {
            info!(%endpoint, "using remote risk classifier");
            Arc::new(RemoteClassifier::new(
                endpoint.clone(),
                config.classifier_model.clone(),
                config.classifier_api_key.clone(),
            ))
        }
        None => {
            info!("no classifier endpoint configured; deterministic phases only");
            Arc::new(RuleClassifier::permissive())
        }
    };

    let ledger = Arc::new(Ledger::open(&config.ledger_path)?);
    let sessions = Arc::new(SessionStore::default());

    let interceptor = Arc::new(Interceptor::new(
        manifest,
        sessions,
        classifier,
        authority,
        ledger.clone(),
        sanitizer,
        backend,
        config.context_defaults.clone(),
    ));
    let gateway = Arc::new(Gateway::new(interceptor));

    let result = match cli.transport {
        TransportKind::Stdio => transport::run_stdio(gateway).await,
        TransportKind::Http => http::run_http(gateway, config.port).await,
    };

    let pending = ledger.pending_count();
    if pending > 0 {
        tracing::warn!(pending, "ledger entries still queued at shutdown");
    }

    result
}
