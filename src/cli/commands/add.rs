//! Add command - add a pipe to the running daemon

use anyhow::{Context, Result};

use super::{connect, parse_endpoint};
use crate::cli::args::AddArgs;
use crate::config::GraceDir;

/// Execute the add command
pub async fn execute(args: AddArgs, dir: &GraceDir) -> Result<()> {
    let src = parse_endpoint(&args.src)?;
    let dst = parse_endpoint(&args.dst)?;

    let mut client = connect(dir).await?;
    client
        .add_pipe(src.clone(), dst.clone())
        .await
        .with_context(|| format!("Failed to add pipe on {}", src))?;

    println!("Forwarding {} -> {}", src, dst);
    Ok(())
}
