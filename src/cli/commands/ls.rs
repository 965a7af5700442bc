//! Ls command - show every pipe and its destinations

use anyhow::{Context, Result};

use super::connect;
use crate::cli::args::LsArgs;
use crate::config::GraceDir;
use crate::orchestrator::PipeStatus;

/// Execute the ls command
pub async fn execute(args: LsArgs, dir: &GraceDir) -> Result<()> {
    let mut client = connect(dir).await?;
    let pipes = client.list().await.context("Failed to list pipes")?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&pipes)?),
        _ => print!("{}", render_table(&pipes)),
    }
    Ok(())
}

fn render_table(pipes: &[PipeStatus]) -> String {
    if pipes.is_empty() {
        return "No pipes.\n".to_string();
    }

    let src_width = pipes
        .iter()
        .map(|p| p.src.as_str().len())
        .chain(std::iter::once("SRC".len()))
        .max()
        .unwrap_or(0);
    let dst_width = pipes
        .iter()
        .map(|p| p.dst.as_str().len())
        .chain(std::iter::once("DST".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<src_width$}  {:<dst_width$}  {:>5}  ACTIVE\n",
        "SRC", "DST", "CONNS"
    );
    for pipe in pipes {
        out.push_str(&format!(
            "{:<src_width$}  {:<dst_width$}  {:>5}  {}\n",
            pipe.src.as_str(),
            pipe.dst.as_str(),
            pipe.conns,
            if pipe.active { "*" } else { "" }
        ));
    }
    out
}
