//! Multi-venue supervisor (C9): fans out one [`VenueSupervisor`] per
//! configured venue. Cancellation of the outer token cancels every child;
//! one child's failure is logged and does not abort the others.

use tokio_util::sync::CancellationToken;
use tracing::error;

use super::venue::VenueSupervisor;

/// Run every supervisor in `supervisors` concurrently until `cancel` fires.
pub async fn run_multi_venue(supervisors: Vec<VenueSupervisor>, cancel: CancellationToken) {
    let mut handles = Vec::with_capacity(supervisors.len());
    for supervisor in supervisors {
        let child_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = supervisor.run(child_cancel).await {
                error!(error = %e, "venue supervisor exited with error");
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}
