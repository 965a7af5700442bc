//! Switch command - send new connections to a different destination

use anyhow::{Context, Result};

use super::{connect, parse_endpoint};
use crate::cli::args::SwitchArgs;
use crate::config::GraceDir;

/// Execute the switch command
pub async fn execute(args: SwitchArgs, dir: &GraceDir) -> Result<()> {
    let src = parse_endpoint(&args.src)?;
    let dst = parse_endpoint(&args.dst)?;

    let mut client = connect(dir).await?;
    client
        .switch(src.clone(), dst.clone())
        .await
        .with_context(|| format!("Failed to switch {}", src))?;

    tracing::info!(src = %src, dst = %dst, "Switched");
    Ok(())
}
