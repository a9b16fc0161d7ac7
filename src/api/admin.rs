use serde::Deserialize;

use super::client::ApiClient;
use super::paths;
use crate::error::ApiError;
use crate::models::AdminStats;

#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    stats: AdminStats,
}

pub async fn admin_stats(client: &ApiClient) -> Result<AdminStats, ApiError> {
    let envelope: StatsEnvelope = client.get(paths::ADMIN_STATS, Vec::new()).await?;
    Ok(envelope.stats)
}
