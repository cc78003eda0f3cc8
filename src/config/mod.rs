mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    BrokerSettings, DEFAULT_ENDPOINT, DeliverySettings, LoggingSettings, Settings,
    SubscriptionSettings, TopicSettings, TopologySettings,
};

/// Loads the configuration from `config/default` (any format the `config`
/// crate understands, optional) and `EMBUS_*` environment variables, with
/// `__` separating nested keys (`EMBUS_BROKER__SCAN_INTERVAL_MS`).
/// Missing values fall back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("EMBUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}

#[cfg(test)]
mod tests;
