//! Shared harness for the integration suites: throwaway RS256 keypairs
//! (generated once per test binary) and a fully wired gateway over the
//! in-process execution environment.

#![allow(dead_code)]

use chimera::authority::warrant::WarrantVerifier;
use chimera::authority::{CredentialAuthority, Keyring};
use chimera::classifier::rules::ClassifierRule;
use chimera::classifier::{RiskClassifier, RuleClassifier};
use chimera::engine::manifest::{MatchLeaf, MatchOp};
use chimera::engine_core::interceptor::Interceptor;
use chimera::engine_core::ledger::Ledger;
use chimera::engine_core::models::{ContextDefaults, JsonRpcRequest};
use chimera::engine_core::sanitizer::ResponseSanitizer;
use chimera::engine_core::session::SessionStore;
use chimera::exec::{ExecutionEnvironment, ScenarioConfig};
use chimera::mcp::backend::InProcessBackend;
use chimera::mcp::gateway::Gateway;
use chimera::utils::policy_loader::PolicyLoader;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

pub const PRIME_KID: &str = "slot-a";
pub const SHADOW_KID: &str = "slot-b";

pub struct TestKeys {
    pub prime_private: String,
    pub prime_public: String,
    pub shadow_private: String,
    pub shadow_public: String,
}

fn generate_pair() -> (String, String) {
    let mut rng = rand_core::OsRng;
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen");
    let public = RsaPublicKey::from(&private);
    (
        private
            .to_pkcs8_pem(LineEnding::LF)
            .expect("private pem")
            .to_string(),
        public.to_public_key_pem(LineEnding::LF).expect("public pem"),
    )
}

/// Key generation is expensive in debug builds; do it once per test binary.
pub fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let (prime_private, prime_public) = generate_pair();
        let (shadow_private, shadow_public) = generate_pair();
        TestKeys {
            prime_private,
            prime_public,
            shadow_private,
            shadow_public,
        }
    })
}

pub fn keyring() -> Keyring {
    let keys = test_keys();
    Keyring::from_pems(
        PRIME_KID,
        keys.prime_private.as_bytes(),
        keys.prime_public.as_bytes(),
        SHADOW_KID,
        keys.shadow_private.as_bytes(),
        keys.shadow_public.as_bytes(),
    )
    .expect("keyring")
}

pub fn authority() -> CredentialAuthority {
    CredentialAuthority::new(keyring())
}

pub fn prime_verifier() -> WarrantVerifier {
    WarrantVerifier::from_public_pem(PRIME_KID, test_keys().prime_public.as_bytes()).unwrap()
}

pub fn shadow_verifier() -> WarrantVerifier {
    WarrantVerifier::from_public_pem(SHADOW_KID, test_keys().shadow_public.as_bytes()).unwrap()
}

pub fn scenario_yaml(production_root: &std::path::Path, shadow_root: &std::path::Path) -> String {
    format!(
        r#"
tools:
  read_file: {{ kind: file_read, path_field: filename }}
  get_patient_record: {{ kind: record_lookup, collection: patients, id_field: patient_id }}
  query_db: {{ kind: echo }}
collections:
  patients:
    id_field: patient_id
    fields:
      patient_id: {{ type: id }}
      name: {{ type: name }}
      diagnosis:
        type: choice
        options: [hypertension, asthma, chronic migraine]
      age: {{ type: number, min: 19, max: 94, integer: true }}
    production_rows:
      - {{ patient_id: 100, name: "Elena Vasquez", diagnosis: "asthma", age: 34 }}
production_root: {}
shadow_root: {}
"#,
        production_root.display(),
        shadow_root.display()
    )
}

pub fn classifier_rule(field: &str, op: MatchOp, value: Value, risk: f64) -> ClassifierRule {
    ClassifierRule {
        leaf: MatchLeaf {
            field: field.to_string(),
            operator: op,
            value: Some(value),
            value_from_context: None,
        },
        risk,
        confidence: 0.9,
        reason: format!("test rule on {field}"),
        tags: BTreeSet::new(),
    }
}

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub interceptor: Arc<Interceptor>,
    pub environment: Arc<ExecutionEnvironment>,
    pub ledger_path: PathBuf,
    pub production_root: PathBuf,
    pub shadow_root: PathBuf,
    _dirs: Vec<TempDir>,
}

impl Harness {
    pub fn new(manifest_yaml: &str, classifier_rules: Vec<ClassifierRule>) -> Self {
        let production_dir = TempDir::new().unwrap();
        let shadow_dir = TempDir::new().unwrap();
        let work_dir = TempDir::new().unwrap();

        let manifest_path = work_dir.path().join("policy.yaml");
        std::fs::write(&manifest_path, manifest_yaml).unwrap();
        let (manifest, _digest) = PolicyLoader::load(&manifest_path).expect("manifest loads");

        let scenario: ScenarioConfig =
            serde_yaml_ng::from_str(&scenario_yaml(production_dir.path(), shadow_dir.path()))
                .unwrap();
        scenario.validate().unwrap();

        let environment = Arc::new(
            ExecutionEnvironment::new(Arc::new(scenario), prime_verifier(), shadow_verifier())
                .with_jitter(1, 2),
        );

        let ledger_path = work_dir.path().join("ledger.jsonl");
        let sanitizer = Arc::new(ResponseSanitizer::with_rules(&manifest.sanitizer).unwrap());
        let classifier: Arc<dyn RiskClassifier> = Arc::new(RuleClassifier::new(classifier_rules));

        let interceptor = Arc::new(Interceptor::new(
            Arc::new(manifest),
            Arc::new(SessionStore::default()),
            classifier,
            Arc::new(authority()),
            Arc::new(Ledger::open(&ledger_path).unwrap()),
            sanitizer,
            Arc::new(InProcessBackend::new(environment.clone())),
            ContextDefaults::default(),
        ));

        Self {
            gateway: Arc::new(Gateway::new(interceptor.clone())),
            interceptor,
            environment,
            ledger_path,
            production_root: production_dir.path().to_path_buf(),
            shadow_root: shadow_dir.path().to_path_buf(),
            _dirs: vec![production_dir, shadow_dir, work_dir],
        }
    }

    /// Manifest fragment shared by the end-to-end suites. Mirrors the
    /// shipped default policy.
    pub fn default_manifest() -> &'static str {
        r#"
default_action: production
trusted_workflows:
  - id: dr-chen-production
    tools: [read_file]
    match:
      all:
        - { field: context.user_id, operator: eq, value: dr_chen }
        - { field: context.user_role, operator: eq, value: lead_researcher }
        - { field: context.source, operator: eq, value: lab_workstation }
    action: production
    allow_only: true
    reason: "Founding researcher workflow"
security_policies:
  - id: taint-lockdown
    match:
      all:
        - { field: context.is_tainted, operator: eq, value: true }
        - { field: context.tool_category, operator: eq, value: sensitive }
    action: shadow
    reason: "Tainted session touching sensitive tools"
  - id: suspicious-keyword-trigger
    match:
      all:
        - { field: context.is_suspicious_query, operator: eq, value: true }
        - { field: context.user_role, operator: neq, value: lead_researcher }
    action: shadow
    reason: "Keyword probe from a non-researcher"
accumulated_risk:
  field: accumulated_risk
  operator: gte
  threshold: 1.5
  action: shadow
  reason: "Session risk budget exceeded"
event_risk:
  field: event_risk
  operator: gte
  threshold: 0.85
  action: shadow
  reason: "High single-event risk"
  confidence_floor: 0.5
taint:
  file_tools: [read_file]
  path_fields: [filename, path]
  red_patterns: [resume, upload, /shared/]
  green_patterns: [/private/, _conf_]
suspicious_keywords: [formula, exfiltrate, credentials]
tool_categories:
  get_patient_record: sensitive
  read_file: file
"#
    }

    pub fn write_production_file(&self, path: &str, content: &str) {
        let full = self.production_root.join(path.trim_start_matches('/'));
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
}

pub fn tool_call(id: i64, tool: &str, arguments: Value, context: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: "tools/call".to_string(),
        params: Some(json!({
            "name": tool,
            "arguments": arguments,
            "context": context,
        })),
        id: Some(json!(id)),
    }
}

/// Pull the text payload out of an MCP-style tool result.
pub fn result_text(response: &chimera::engine_core::models::JsonRpcResponse) -> String {
    response
        .result
        .as_ref()
        .and_then(|r| r["content"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string()
}
