//! Supervisor loop (C9, §5): drives one node's fixed-order tick forever —
//! heartbeat, upload-reconcile, download-reconcile, one feed poll, admission
//! to fixpoint — isolating per-stage failures so one bad tick never stops
//! the loop.

use std::time::Duration;

use tracing::{error, info, instrument};

use crate::context::AppContext;
use crate::error::AppResult;
use crate::{admission, download, feed, heartbeat, upload};

/// Run the supervisor loop forever, sleeping `tick_interval` between ticks.
pub async fn run(ctx: AppContext, tick_interval: Duration) -> ! {
    info!(node_id = %ctx.node_id, interval_secs = tick_interval.as_secs(), "supervisor starting");
    loop {
        if let Err(err) = run_tick(&ctx).await {
            error!(node_id = %ctx.node_id, %err, "tick aborted");
        }
        tokio::time::sleep(tick_interval).await;
    }
}

/// Run exactly one tick, in the fixed order required by §5. Each stage's
/// own internal per-item failures are already caught by that stage; this
/// only surfaces failures that abort the *stage itself* (e.g. the store or
/// the local torrent client being unreachable).
///
/// # Errors
///
/// Returns the first stage failure encountered; later stages in the same
/// tick are skipped, but the loop in [`run`] continues on the next tick.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn run_tick(ctx: &AppContext) -> AppResult<()> {
    heartbeat::beat(ctx).await?;
    upload::reconcile(ctx).await?;
    download::reconcile(ctx).await?;
    feed::poll_due_feed(ctx).await?;
    let admitted = admission::admit_to_fixpoint(ctx).await?;
    if admitted > 0 {
        info!(node_id = %ctx.node_id, admitted, "admitted items this tick");
    }
    Ok(())
}
