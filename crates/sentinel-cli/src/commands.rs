use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use sentinel_crypto::{photo_hash, ContentHasher};
use sentinel_server::{SentinelConfig, SentinelServer};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Config(args) => cmd_config(args),
        Command::Hash(args) => cmd_hash(args, &cli.format),
    }
}

fn load_config(args: &ServeArgs) -> anyhow::Result<SentinelConfig> {
    let mut config = match &args.config {
        Some(path) => SentinelConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SentinelConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    config.facilities.extend(args.facilities.iter().cloned());
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    if config.facilities.is_empty() {
        tracing::warn!("no facilities configured, every capture will be rejected");
    }
    println!(
        "{} Sentinel server on {} ({} storage, {} facilities)",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold(),
        format!("{:?}", config.storage.backend).to_lowercase().cyan(),
        config.facilities.len()
    );
    let server = SentinelServer::from_config(config).await?;
    server.serve().await?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let text = SentinelConfig::default().to_toml_string()?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} Wrote {}", "✓".green(), path.display().to_string().bold());
        }
        None => print!("{text}"),
    }
    Ok(())
}

struct HashReport {
    photo_hash: String,
    memory_id: String,
    fs_id: String,
    size: usize,
}

fn hash_file(path: &Path) -> anyhow::Result<HashReport> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(HashReport {
        photo_hash: photo_hash(&data).to_hex(),
        memory_id: ContentHasher::MEMORY.content_id(&data).to_string(),
        fs_id: ContentHasher::FILESYSTEM.content_id(&data).to_string(),
        size: data.len(),
    })
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let report = hash_file(&args.file)?;
    match format {
        OutputFormat::Json => {
            let value = json!({
                "file": args.file.display().to_string(),
                "size": report.size,
                "photoHash": report.photo_hash,
                "contentIds": { "memory": report.memory_id, "fs": report.fs_id },
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("{} ({} bytes)", args.file.display().to_string().bold(), report.size);
            println!("  Photo hash (SHA-256): {}", report.photo_hash.yellow());
            println!("  Content id (memory):  {}", report.memory_id.cyan());
            println!("  Content id (fs):      {}", report.fs_id.cyan());
        }
    }
    Ok(())
}
