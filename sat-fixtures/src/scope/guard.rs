use serde_json::Value;

use sat_client::host::Satellite;

use crate::helpers::FixtureResult;

/// A global setting changed for a while. Releasing it writes back the value
/// seen at acquisition, whatever it was, including null and empty.
#[derive(Debug)]
pub struct SettingGuard {
    satellite: Satellite,
    name: String,
    previous: Value,
    released: bool,
}

impl SettingGuard {
    pub async fn acquire(satellite: &Satellite, name: &str, value: Value) -> FixtureResult<Self> {
        let previous = satellite.update_setting(name, &value).await?;
        Ok(Self {
            satellite: satellite.clone(),
            name: name.to_string(),
            previous,
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn previous(&self) -> &Value {
        &self.previous
    }

    pub async fn release(mut self) -> FixtureResult<()> {
        self.released = true;
        self.satellite
            .api()
            .update_setting(&self.name, &self.previous)
            .await?;
        tracing::info!("Setting {} restored to {}", self.name, self.previous);
        Ok(())
    }
}

impl Drop for SettingGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                "Setting {} on {} was never restored (still changed from {})",
                self.name,
                self.satellite.hostname,
                self.previous
            );
        }
    }
}
