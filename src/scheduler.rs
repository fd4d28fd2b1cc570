use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{db::DbPool, services::token_service};

/// Starts the hourly sweep that deletes expired activation, password-reset
/// and refresh tokens.
pub async fn start_token_sweeper(pool: DbPool) -> anyhow::Result<()> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            match token_service::sweep_expired_tokens(&pool).await {
                Ok((activation, reset, refresh)) => {
                    tracing::info!(activation, reset, refresh, "expired tokens swept");
                }
                Err(err) => {
                    tracing::error!(error = %err, "token sweep failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!("token sweep scheduler started");
    Ok(())
}
