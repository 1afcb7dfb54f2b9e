use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::context::BotContext;
use super::handlers::handle_update;
use super::session::SessionStore;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Long-polls Telegram and runs every update in its own task.
pub struct Dispatcher {
    ctx: BotContext,
    poll_timeout_secs: u64,
}

impl Dispatcher {
    pub fn new(ctx: BotContext) -> Self {
        let poll_timeout_secs = ctx.config.poll_timeout_secs;
        Self {
            ctx,
            poll_timeout_secs,
        }
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C, running without it.");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `shutdown` completes, then waits for in-flight handlers.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let sweeper = spawn_session_sweeper(self.ctx.sessions.clone(), SESSION_SWEEP_INTERVAL);
        let mut handlers = JoinSet::new();
        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;
        info!(poll_timeout_secs = self.poll_timeout_secs, "Update polling started.");

        loop {
            while let Some(finished) = handlers.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Update handler task panicked.");
                }
            }

            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.ctx.telegram.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    if !updates.is_empty() {
                        debug!(count = updates.len(), "Received updates.");
                    }
                    // Updates from one chat are not serialized; two fast replies to the
                    // same prompt both see the old session state and the last write wins.
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let ctx = self.ctx.clone();
                        handlers.spawn(async move { handle_update(&ctx, update).await });
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in_secs = backoff.as_secs(), "Failed to fetch updates.");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        info!(in_flight = handlers.len(), "Shutdown requested, waiting for handlers.");
        sweeper.abort();
        while let Some(finished) = handlers.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Update handler task panicked.");
            }
        }
        info!("Update polling stopped.");
    }
}

fn spawn_session_sweeper(sessions: SessionStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "Expired sessions removed.");
            }
        }
    })
}
