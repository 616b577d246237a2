use serde::Deserialize;

use crate::compress::CompressSettings;
use crate::download::DownloadSettings;
use crate::fetch::FetchSettings;

/// Every tunable of the three IO stages. Missing sections or fields in a
/// settings file fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub fetch: FetchSettings,
    pub download: DownloadSettings,
    pub compress: CompressSettings,
}

/// Durations are written as whole seconds in settings files.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
