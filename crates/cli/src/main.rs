//! `warden`: inspect an authorization rule set.
//!
//! Loads a JSON configuration, seeds in-memory stores from it and answers
//! questions about the resulting tree.
//!
//! # Environment Variables
//!
//! - `WARDEN_PRIORITISE_POSITIVE_RULES`: overrides `prioritisePositiveRules`
//! - `WARDEN_LOG_FORMAT`: `json` (default), `pretty` or `compact`
//! - `RUST_LOG`: log filter (default `warn` for this tool)

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use warden_auth::{Principal, PrincipalId, RuleLibrary};
use warden_core::Specifier;
use warden_infra::{
    AuthConfig, InMemoryRuleRecordStore, InMemoryRuleRepository, InMemorySpecifierStore,
    RuleRepository, bootstrap,
};
use warden_observability::{LogFormat, ObservabilityConfig};

/// Inspect and query a hierarchical authorization rule set
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Rule configuration (JSON). Without one the rule set is empty.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Let positive matches win over negative ones
    #[arg(long)]
    prioritise_positive: bool,

    /// Log output format (also: WARDEN_LOG_FORMAT)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flattened rule tree
    Tree {
        /// Also list the root and nodes without rules
        #[arg(long)]
        include_empty: bool,
    },

    /// Print the rules held at one specifier
    Rules {
        #[arg(long)]
        spec: Specifier,
    },

    /// Print the rules of every node from the root to a specifier
    Path {
        #[arg(long)]
        spec: Specifier,
    },

    /// Decide a request and explain the decision. Exits non-zero on deny.
    Check {
        #[arg(long)]
        spec: Specifier,

        /// Role held by the principal (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Principal id
        #[arg(long)]
        principal: Option<PrincipalId>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let observability = match cli.log_format {
        Some(format) => ObservabilityConfig::default().with_format(format),
        None => ObservabilityConfig::default().with_env_format(),
    };
    warden_observability::init_with(&observability.with_default_directive("warn"));

    let stdout = std::io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(Outcome::Done) | Ok(Outcome::Allowed) => ExitCode::SUCCESS,
        Ok(Outcome::Denied) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Allowed,
    Denied,
}

fn load_config(cli: &Cli) -> Result<AuthConfig> {
    let config = match &cli.config {
        Some(path) => AuthConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AuthConfig::default(),
    };
    let config = config.with_env_overrides()?;
    Ok(if cli.prioritise_positive {
        config.with_prioritise_positive_rules(true)
    } else {
        config
    })
}

fn load_repository(config: &AuthConfig) -> Result<InMemoryRuleRepository> {
    let repository = RuleRepository::new(
        InMemorySpecifierStore::arc(),
        InMemoryRuleRecordStore::arc(),
        Arc::new(RuleLibrary::new(config.precedence())),
    );
    let report = bootstrap(&repository, config).context("bootstrapping rules")?;
    info!(seeded = report.seeded, skipped = report.skipped, "rule set loaded");
    Ok(repository)
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn run<W: Write>(cli: Cli, out: &mut W) -> Result<Outcome> {
    let config = load_config(&cli)?;
    let repository = load_repository(&config)?;
    let library = repository.library();

    match cli.command {
        Command::Tree { include_empty } => {
            print_json(out, &library.list_nodes(include_empty))?;
            Ok(Outcome::Done)
        }
        Command::Rules { spec } => {
            print_json(out, &library.list_auth_rules(&spec))?;
            Ok(Outcome::Done)
        }
        Command::Path { spec } => {
            print_json(out, &library.get_node_path(&spec))?;
            Ok(Outcome::Done)
        }
        Command::Check {
            spec,
            roles,
            principal,
        } => {
            let mut subject = Principal::with_roles(roles);
            if let Some(id) = principal {
                subject = subject.with_id(id);
            }
            let decision = library.explain(&subject, &spec);
            print_json(out, &decision)?;
            Ok(if decision.allowed {
                Outcome::Allowed
            } else {
                Outcome::Denied
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn run_args(args: &[&str]) -> (Outcome, serde_json::Value) {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        let outcome = run(cli, &mut out).unwrap();
        (outcome, serde_json::from_slice(&out).unwrap())
    }

    const RULES: &str = r#"{
        "rules": [
            { "spec": "model", "role": "guest", "positive": false, "propagates": true },
            { "spec": "model.read", "role": "guest", "positive": true }
        ]
    }"#;

    #[test]
    fn check_reports_the_deciding_rule() {
        let file = config_file(RULES);
        let path = file.path().to_str().unwrap();

        let (outcome, decision) =
            run_args(&["warden", "-c", path, "check", "--spec", "model.write", "--role", "guest"]);
        assert_eq!(outcome, Outcome::Denied);
        assert_eq!(decision["allowed"], false);

        let (outcome, _) =
            run_args(&["warden", "-c", path, "check", "--spec", "model.read", "--role", "guest"]);
        assert_eq!(outcome, Outcome::Allowed);
    }

    #[test]
    fn tree_lists_nodes() {
        let file = config_file(RULES);
        let path = file.path().to_str().unwrap();

        let (outcome, listing) = run_args(&["warden", "-c", path, "tree", "--include-empty"]);
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(listing.as_array().unwrap().len(), 3);
    }

    #[test]
    fn without_config_everything_is_allowed() {
        let (outcome, _) = run_args(&["warden", "check", "--spec", "anything.at.all"]);
        assert_eq!(outcome, Outcome::Allowed);
    }

    #[test]
    fn rejects_malformed_specifiers() {
        assert!(Cli::try_parse_from(["warden", "rules", "--spec", "a..b"]).is_err());
    }
}
