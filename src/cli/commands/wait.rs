//! Wait command - block until a pipe's old destinations have drained

use anyhow::{Context, Result, bail};

use super::{connect, parse_endpoint};
use crate::cli::args::WaitArgs;
use crate::config::{GraceDir, parse_duration};

/// Execute the wait command
pub async fn execute(args: WaitArgs, dir: &GraceDir) -> Result<()> {
    let src = parse_endpoint(&args.src)?;
    let timeout = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .context("Invalid --timeout")?;

    let mut client = connect(dir).await?;
    let drained = client.wait(src.clone());

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, drained).await {
            Ok(result) => result.with_context(|| format!("Failed to wait on {}", src))?,
            Err(_) => bail!("{} did not drain within {:?}", src, limit),
        },
        None => drained
            .await
            .with_context(|| format!("Failed to wait on {}", src))?,
    }

    tracing::info!(src = %src, "Drained");
    Ok(())
}
