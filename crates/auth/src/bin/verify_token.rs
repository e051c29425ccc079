//! Verify an ID token against the live issuer keys and print the identity.
//!
//! Usage: `stockyard-verify-token <token>` or pipe the token on stdin.
//! Configuration comes from `STOCKYARD_AUTH_*` environment variables.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use stockyard_auth::{AuthConfig, TokenVerifier};
use stockyard_core::SystemClock;

#[tokio::main]
async fn main() -> ExitCode {
    stockyard_observability::init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = AuthConfig::from_env().context("invalid STOCKYARD_AUTH_* configuration")?;
    let token = read_token()?;

    let verifier = TokenVerifier::from_config(&config, Arc::new(SystemClock))
        .context("failed to construct token verifier")?;

    match verifier.verify_id_token(&token).await {
        Ok(identity) => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::warn!(kind = err.kind(), "token rejected");
            eprintln!("rejected ({}): {err}", err.kind());
            Ok(ExitCode::from(1))
        }
    }
}

fn read_token() -> anyhow::Result<String> {
    if let Some(arg) = std::env::args().nth(1) {
        return Ok(arg.trim().to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read token from stdin")?;
    let token = buf.trim().to_string();
    anyhow::ensure!(!token.is_empty(), "no token given (pass as argument or on stdin)");
    Ok(token)
}
