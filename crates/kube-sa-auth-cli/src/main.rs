//! kube-sa-auth - run one ServiceAccount authentication attempt.
//!
//! Configuration comes from the same environment variables the library
//! reads. The outcome is printed to stdout as JSON; logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kube_sa_auth::{AuthConfig, AuthError, Authenticator, ValidatedIdentity};

/// Authenticate a Kubernetes ServiceAccount token.
#[derive(Parser, Debug)]
#[command(name = "kube-sa-auth")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Claimed identity: `namespace/serviceaccount` or `cluster/namespace/serviceaccount`.
    #[arg(long, short)]
    user: String,

    /// Bearer token. Read from stdin when neither this nor --token-file is given.
    #[arg(long, env = "KUBE_SA_AUTH_TOKEN", hide_env_values = true, conflicts_with = "token_file")]
    token: Option<String>,

    /// File containing the bearer token.
    #[arg(long)]
    token_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kube_sa_auth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let token = resolve_token(&args)?;

    let config = AuthConfig::from_env();
    let authenticator = Authenticator::from_config(&config).context("failed to configure authenticator")?;

    let result = authenticator.authenticate(&args.user, &token).await;
    let code = if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };
    println!("{}", serde_json::to_string_pretty(&report(&result))?);
    Ok(code)
}

fn resolve_token(args: &Args) -> anyhow::Result<String> {
    let raw = match (&args.token, &args.token_file) {
        (Some(token), _) => token.clone(),
        (None, Some(path)) => read_token_file(path)?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read token from stdin")?;
            buf
        }
    };

    let token = raw.trim();
    if token.is_empty() {
        bail!("no token provided");
    }
    Ok(token.to_string())
}

fn read_token_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read token file {}", path.display()))
}

fn report(result: &Result<ValidatedIdentity, AuthError>) -> serde_json::Value {
    match result {
        Ok(identity) => json!({
            "authenticated": true,
            "username": identity.username(),
            "identity": identity,
        }),
        Err(e) => json!({
            "authenticated": false,
            "error": e.kind(),
            "message": e.to_string(),
        }),
    }
}
