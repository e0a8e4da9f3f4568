use engine_core::throttle::ThrottleSettings;
use serde::{Deserialize, Deserializer};

/// Partial throttle table; unset keys keep the base profile's values.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThrottleOverrides {
    default_size: Option<u64>,
    increment: Option<u64>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    latency_ceiling_ms: Option<u64>,
}

impl ThrottleOverrides {
    fn apply(self, mut base: ThrottleSettings) -> ThrottleSettings {
        if let Some(v) = self.default_size {
            base.default_size = v;
        }
        if let Some(v) = self.increment {
            base.increment = v;
        }
        if self.min_size.is_some() {
            base.min_size = self.min_size;
        }
        if self.max_size.is_some() {
            base.max_size = self.max_size;
        }
        if let Some(v) = self.latency_ceiling_ms {
            base.latency_ceiling_ms = v;
        }
        base
    }
}

pub(crate) fn page_size<'de, D>(deserializer: D) -> Result<ThrottleSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = ThrottleOverrides::deserialize(deserializer)?;
    Ok(overrides.apply(ThrottleSettings::page_size()))
}

pub(crate) fn transfer_chunk<'de, D>(deserializer: D) -> Result<ThrottleSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = ThrottleOverrides::deserialize(deserializer)?;
    Ok(overrides.apply(ThrottleSettings::transfer_chunk()))
}

/// Checks the invariants every throttle relies on.
pub(crate) fn validate(
    field: &'static str,
    settings: &ThrottleSettings,
) -> Result<(), crate::error::SettingsError> {
    use crate::error::SettingsError;

    if settings.increment == 0 {
        return Err(SettingsError::invalid(field, "increment must be positive"));
    }
    if settings.default_size == 0 {
        return Err(SettingsError::invalid(field, "default size must be positive"));
    }
    if settings.latency_ceiling_ms == 0 {
        return Err(SettingsError::invalid(
            field,
            "latency ceiling must be positive",
        ));
    }
    if let Some(max) = settings.max_size {
        if max < settings.floor() {
            return Err(SettingsError::invalid(
                field,
                format!("max size {max} is below the floor {}", settings.floor()),
            ));
        }
    }
    Ok(())
}
