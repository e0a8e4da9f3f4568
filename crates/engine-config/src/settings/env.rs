use super::ShopshiftConfig;
use crate::error::SettingsError;
use std::{collections::HashMap, str::FromStr};
use tracing::{debug, warn};

pub const ENV_PREFIX: &str = "SHOPSHIFT_";

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Applies every `SHOPSHIFT_*` variable found in `vars` on top of `config`.
/// Returns the number of overrides applied. Unknown keys are ignored.
pub fn apply_env_overrides(
    config: &mut ShopshiftConfig,
    vars: &HashMap<String, String>,
) -> Result<usize, SettingsError> {
    let mut applied = 0;

    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let migration = &mut config.migration;
        match name {
            "PAGE_SIZE" => migration.batch.default_size = parse(key, value)?,
            "PAGE_INCREMENT" => migration.batch.increment = parse(key, value)?,
            "PAGE_MIN" => migration.batch.min_size = Some(parse(key, value)?),
            "PAGE_MAX" => migration.batch.max_size = Some(parse(key, value)?),
            "PAGE_LATENCY_CEILING_MS" => migration.batch.latency_ceiling_ms = parse(key, value)?,
            "CHUNK_SIZE" => migration.assets.transfer.default_size = parse(key, value)?,
            "CHUNK_INCREMENT" => migration.assets.transfer.increment = parse(key, value)?,
            "CHUNK_MAX" => migration.assets.transfer.max_size = Some(parse(key, value)?),
            "CHUNK_LATENCY_CEILING_MS" => {
                migration.assets.transfer.latency_ceiling_ms = parse(key, value)?
            }
            "ASSET_WORKLOAD_SIZE" => migration.assets.workload_size = parse(key, value)?,
            "ASSET_ID_PAGE_SIZE" => migration.assets.id_page_size = parse(key, value)?,
            "ASSET_ERROR_THRESHOLD" => migration.assets.error_threshold = parse(key, value)?,
            "ASSET_FAILURE_THRESHOLD" => {
                migration.assets.transport_failure_threshold = parse(key, value)?
            }
            "COORDINATOR_WINDOW_MS" => migration.coordinator.wait_window_ms = parse(key, value)?,
            "COORDINATOR_DIR" => migration.coordinator.socket_dir = Some(value.trim().into()),
            "GATEWAY_URL" => config.gateway.base_url = value.trim().to_string(),
            "ACCESS_TOKEN" => config.gateway.access_token = Some(value.trim().to_string()),
            "GATEWAY_TIMEOUT_SECS" => config.gateway.timeout_secs = parse(key, value)?,
            "LOG" | "CONFIG" => continue,
            _ => {
                warn!(key = %key, "Ignoring unknown settings variable");
                continue;
            }
        }

        debug!(key = %key, "Applied settings override");
        applied += 1;
    }

    Ok(applied)
}
