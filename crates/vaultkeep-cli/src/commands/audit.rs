//! Security audit command.

use clap::Args;

use crate::context::Context;
use crate::render;

/// Audit command arguments.
#[derive(Args)]
pub struct AuditArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the audit command.
pub async fn run(ctx: &Context, args: AuditArgs) -> anyhow::Result<()> {
    let session = ctx.unlock().await?;
    let report = session.audit_report().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::render_report(&report, &session.engine().items());
    }
    session.lock();
    Ok(())
}
