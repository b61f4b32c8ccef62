//! Export and import commands.

use anyhow::Context as _;
use clap::Args;
use console::style;
use std::path::{Path, PathBuf};
use vaultkeep_core::paths;
use vaultkeep_sync::{export_vault, import_vault, ExportDocument};

use crate::context::Context;

/// Export command arguments.
#[derive(Args)]
pub struct ExportArgs {
    /// Output file ("-" for stdout). Defaults to the exports directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Import command arguments.
#[derive(Args)]
pub struct ImportArgs {
    /// Export file to read
    pub file: PathBuf,
}

pub async fn export(ctx: &Context, args: ExportArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let document = export_vault(session.engine())?;
    let json = document.to_json()?;
    session.lock();

    let path = match args.output {
        Some(path) if path.as_os_str() == "-" => {
            println!("{json}");
            return Ok(());
        }
        Some(path) => path,
        None => {
            paths::ensure_dirs()?;
            let name = format!(
                "vaultkeep-export-{}.json",
                document.metadata.exported_at.format("%Y%m%d-%H%M%S")
            );
            paths::exports_dir()?.join(name)
        }
    };

    write_private(&path, &json)?;
    println!(
        "{} Exported {} item(s) to {}",
        style("✓").green(),
        document.metadata.item_count,
        path.display()
    );
    eprintln!(
        "{} The export is not encrypted. Delete it once you are done with it.",
        style("!").yellow().bold()
    );
    Ok(())
}

pub async fn import(ctx: &Context, args: ImportArgs) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let document = ExportDocument::from_json(&json)?;
    document.validate()?;

    let session = ctx.unlock().await?;
    let report = import_vault(session.engine(), document).await?;
    session.lock();

    println!("{} Imported {} item(s)", style("✓").green(), report.imported);
    if !report.is_complete() {
        println!("{} {} item(s) failed:", style("✗").red(), report.failed);
        for error in &report.errors {
            println!("  {}", error);
        }
        anyhow::bail!("{} item(s) could not be imported", report.failed);
    }
    Ok(())
}

/// Write `content` readable by the owner only.
fn write_private(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
