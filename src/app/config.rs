use std::path::Path;

use crate::config::ResolvedConfig;
use crate::duration::format_duration;

pub fn config_output(config_path: &Path, config: &ResolvedConfig) -> serde_json::Value {
    let sources: Vec<_> = config
        .sources
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "type": s.source_type,
                "priority": s.priority,
                "url": s.url,
            })
        })
        .collect();

    serde_json::json!({
        "config_file": config_path.display().to_string(),
        "data_directory": config.data_dir.display().to_string(),
        "local_currency": config.local_currency,
        "rates": {
            "staleness": format_duration(config.rates.staleness),
            "refresh_interval": format_duration(config.rates.refresh_interval),
            "request_timeout": format_duration(config.rates.request_timeout),
            "min_rate": config.rates.min_rate,
            "max_rate": config.rates.max_rate,
            "display_decimals": config.rates.display_decimals,
        },
        "sources": sources,
    })
}
