//! First-run setup.

use console::style;
use vaultkeep_core::paths;
use vaultkeep_sync::unlock_key;

use crate::context::Context;

/// Write the config file and derive the vault key once so the salt exists.
pub async fn run(ctx: &Context, force: bool) -> anyhow::Result<()> {
    let config_path = ctx.config_path()?;
    if config_path.exists() && !force {
        println!("Config file already exists: {}", config_path.display());
    } else {
        ctx.config.validate()?;
        paths::ensure_dirs()?;
        ctx.config.save(&config_path)?;
        println!("Created config file: {}", config_path.display());
    }

    let store = ctx.open_store()?;
    let auth = ctx.credentials()?;
    let key = unlock_key(&auth, store.as_ref(), &ctx.config).await?;

    println!(
        "{} Vault ready for '{}' at {}",
        style("✓").green(),
        ctx.user(),
        store.path().display()
    );
    println!("  Key fingerprint: {}", key.fingerprint());
    println!("  There is no way to recover the vault without the master password.");
    Ok(())
}
