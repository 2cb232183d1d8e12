use serde_json::json;
use tracing::info;

use crate::cli::{utils, Context};
use crate::error::ApiError;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    ctx.manager.health_check().await.map_err(ApiError::from)?;
    info!("Database health check passed");

    utils::output_success(
        &ctx.output,
        "Database is reachable",
        Some(json!({
            "environment": ctx.config.environment,
            "read_only_pool": ctx.manager.has_read_only_pool(),
            "tenant_isolation": ctx.config.database.tenant.enabled
        })),
    )
}
