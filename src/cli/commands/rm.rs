//! Rm command - remove a pipe from the running daemon

use anyhow::{Context, Result};

use super::{connect, parse_endpoint};
use crate::cli::args::RmArgs;
use crate::config::GraceDir;

/// Execute the rm command
pub async fn execute(args: RmArgs, dir: &GraceDir) -> Result<()> {
    let src = parse_endpoint(&args.src)?;

    let mut client = connect(dir).await?;
    client
        .remove_pipe(src.clone())
        .await
        .with_context(|| format!("Failed to remove pipe on {}", src))?;

    println!("Stopped listening on {}", src);
    Ok(())
}
