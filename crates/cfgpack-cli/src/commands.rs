use std::path::Path;

use anyhow::Context;
use cfgpack_archive::{
    read_from_folder, read_headers, verify_entries, write_to_folder, ArchiveConfig, ConfigArchive,
};
use cfgpack_types::ContentHash;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args, &cli.format),
        Command::Verify(args) => cmd_verify(args),
        Command::Pack(args) => cmd_pack(args),
        Command::Unpack(args) => cmd_unpack(args),
        Command::Hash(args) => cmd_hash(args, &cli.format),
    }
}

fn read_archive_file(path: &Path) -> anyhow::Result<(Vec<u8>, ConfigArchive)> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let archive = ConfigArchive::from_bytes(&data)
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok((data, archive))
}

fn cmd_inspect(args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (data, archive) = read_archive_file(&args.archive)?;
    let (header, entry_headers) = read_headers(&data)?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = entry_headers
                .iter()
                .map(|h| {
                    let size = archive.entry(&h.name).map_or(0, |e| e.len());
                    json!({
                        "name": h.name,
                        "hash": h.hash,
                        "compression": h.compression,
                        "stored_size": h.payload_length,
                        "size": size,
                    })
                })
                .collect();
            let out = json!({
                "schema_version": header.schema_version,
                "version": archive.version(),
                "created_at": archive.created_at().to_rfc3339(),
                "entries": entries,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Archive {}", args.archive.display().to_string().bold());
            println!("  Schema: {}", header.schema_version);
            println!("  Version: {}", archive.version().to_string().yellow());
            println!("  Created: {}", archive.created_at().to_rfc3339());
            println!("  Entries: {}", archive.len().to_string().bold());
            for h in &entry_headers {
                let size = archive.entry(&h.name).map_or(0, |e| e.len());
                println!(
                    "  {} {} {:>8} -> {:>8} {}",
                    h.hash.short_hex().dimmed(),
                    h.compression.to_string().cyan(),
                    size,
                    h.payload_length,
                    h.name
                );
            }
        }
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<()> {
    let archive = if args.path.is_dir() {
        read_from_folder(&args.path)
            .with_context(|| format!("verifying folder {}", args.path.display()))?
    } else {
        let (_, archive) = read_archive_file(&args.path)?;
        verify_entries(&archive).with_context(|| format!("verifying {}", args.path.display()))?;
        archive
    };
    println!("{} Archive integrity verified", "✓".green().bold());
    println!("  Version: {}", archive.version().to_string().yellow());
    println!("  Entries: {}", archive.len());
    Ok(())
}

fn cmd_pack(args: PackArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ArchiveConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ArchiveConfig::default(),
    };
    if let Some(compression) = args.compression {
        config.compression = compression.into();
    }
    if let Some(min_size) = args.min_size {
        config.min_size_for_compression = min_size;
    }
    debug!(?config, "packing");

    let archive = read_from_folder(&args.folder)
        .with_context(|| format!("reading folder {}", args.folder.display()))?;
    let bytes = archive.to_bytes(&config)?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "{} Packed {} entries into {} ({} bytes)",
        "✓".green().bold(),
        archive.len(),
        args.output.display().to_string().bold(),
        bytes.len()
    );
    println!("  Version: {}", archive.version().to_string().yellow());
    Ok(())
}

fn cmd_unpack(args: UnpackArgs) -> anyhow::Result<()> {
    let (_, archive) = read_archive_file(&args.archive)?;
    verify_entries(&archive)?;
    write_to_folder(&archive, &args.folder)
        .with_context(|| format!("writing folder {}", args.folder.display()))?;
    println!(
        "{} Unpacked {} entries into {}",
        "✓".green().bold(),
        archive.len(),
        args.folder.display().to_string().bold()
    );
    Ok(())
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut hashes = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        hashes.push((file, ContentHash::compute_from_bytes(&data)));
    }
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = hashes
                .iter()
                .map(|(file, hash)| json!({ "file": file.display().to_string(), "hash": hash }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            for (file, hash) in &hashes {
                println!("{}  {}", hash.to_string().yellow(), file.display());
            }
        }
    }
    Ok(())
}
