//! Diagnostic commands.

use clap::Args;
use console::{style, Emoji};
use std::time::Instant;
use vaultkeep_core::{env, paths, Config};
use vaultkeep_crypto::{derive, generate_salt, KdfParams};
use vaultkeep_sync::{FileVaultStore, VaultStore};

use crate::context::Context;

static CHECK: Emoji = Emoji("✓", "+");
static CROSS: Emoji = Emoji("✗", "x");
static WARN: Emoji = Emoji("⚠", "!");

/// Doctor command arguments.
#[derive(Args)]
pub struct DoctorArgs {
    /// Also time one key derivation with the configured rounds
    #[arg(long)]
    pub full: bool,
}

/// Run the doctor command.
pub async fn run(ctx: &Context, args: DoctorArgs) -> anyhow::Result<()> {
    println!("Vaultkeep Doctor\n");

    let mut errors = 0;
    let mut warnings = 0;

    // Check directories
    println!("Checking directories...");

    match paths::base_dir() {
        Ok(dir) => {
            if dir.exists() {
                println!("  {} Base directory exists: {:?}", style(CHECK).green(), dir);
            } else {
                println!("  {} Base directory missing: {:?}", style(WARN).yellow(), dir);
                println!("    Run 'vaultkeep init' to create it");
                warnings += 1;
            }
        }
        Err(e) => {
            println!("  {} Failed to determine base directory: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check config
    println!("\nChecking configuration...");

    match ctx.config_path() {
        Ok(path) if path.exists() => match Config::load(&path) {
            Ok(_) => println!("  {} Configuration loaded: {:?}", style(CHECK).green(), path),
            Err(e) => {
                println!("  {} Configuration error: {}", style(CROSS).red(), e);
                errors += 1;
            }
        },
        Ok(_) => {
            println!("  {} Configuration file not found, using defaults", style(WARN).yellow());
            warnings += 1;
        }
        Err(e) => {
            println!("  {} Configuration error: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    match ctx.config.validate() {
        Ok(_) => println!("  {} Configuration valid", style(CHECK).green()),
        Err(e) => {
            println!("  {} Configuration invalid: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check the store
    println!("\nChecking vault store...");

    match ctx.config.store_path() {
        Ok(path) => match FileVaultStore::open(&path) {
            Ok(store) => {
                println!("  {} Store readable: {:?}", style(CHECK).green(), path);
                match store.load_salt(&ctx.user()).await {
                    Ok(Some(_)) => {
                        println!("  {} Vault initialized for '{}'", style(CHECK).green(), ctx.user())
                    }
                    Ok(None) => {
                        println!("  {} No vault for '{}' yet", style(WARN).yellow(), ctx.user());
                        warnings += 1;
                    }
                    Err(e) => {
                        println!("  {} Store error: {}", style(CROSS).red(), e);
                        errors += 1;
                    }
                }
                check_permissions(&path, &mut warnings);
            }
            Err(e) => {
                println!("  {} Store unreadable: {}", style(CROSS).red(), e);
                errors += 1;
            }
        },
        Err(e) => {
            println!("  {} Failed to determine store path: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check environment
    println!("\nChecking environment...");

    if env::get_var(env::vars::VAULTKEEP_MASTER_PASSWORD).is_some() {
        println!(
            "  {} VAULTKEEP_MASTER_PASSWORD is set; it is visible to other processes of this user",
            style(WARN).yellow()
        );
        warnings += 1;
    } else {
        println!("  {} Master password will be prompted for", style(CHECK).green());
    }

    if args.full {
        println!("\nTiming key derivation...");
        match KdfParams::from_config(&ctx.config.kdf) {
            Ok(params) => {
                let started = Instant::now();
                let result = tokio::task::spawn_blocking(move || {
                    derive(&"doctor".into(), &generate_salt(), &params)
                })
                .await?;
                match result {
                    Ok(_) => println!(
                        "  {} {} rounds took {} ms",
                        style(CHECK).green(),
                        ctx.config.kdf.iterations,
                        started.elapsed().as_millis()
                    ),
                    Err(e) => {
                        println!("  {} Key derivation failed: {}", style(CROSS).red(), e);
                        errors += 1;
                    }
                }
            }
            Err(e) => {
                println!("  {} {}", style(CROSS).red(), e);
                errors += 1;
            }
        }
    }

    // Summary
    println!("\n{}", style("Summary").bold());
    println!("  Errors: {}", if errors > 0 { style(errors).red() } else { style(errors).green() });
    println!("  Warnings: {}", if warnings > 0 { style(warnings).yellow() } else { style(warnings).green() });

    if errors > 0 {
        anyhow::bail!("{} error(s) found", errors);
    }

    Ok(())
}

#[cfg(unix)]
fn check_permissions(path: &std::path::Path, warnings: &mut u32) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        println!(
            "  {} Store file is accessible to other users (mode {:o})",
            style(WARN).yellow(),
            mode
        );
        *warnings += 1;
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &std::path::Path, _warnings: &mut u32) {}
