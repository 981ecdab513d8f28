//! Decides which relays take part in each read and write.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::{PresetRelay, RelayConfig};
use crate::constants::MAX_PUBLISH_RELAYS;
use crate::models::{QueryFilter, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingParams {
    /// The user-selected relay
    pub primary: String,
    /// Read from every preset as well as the primary
    pub use_all_relays: bool,
}

#[derive(Debug)]
pub struct RelayRouter {
    params: RwLock<RoutingParams>,
    presets: Vec<PresetRelay>,
}

impl RelayRouter {
    pub fn new(primary: impl Into<String>, use_all_relays: bool, presets: Vec<PresetRelay>) -> Self {
        Self {
            params: RwLock::new(RoutingParams {
                primary: primary.into(),
                use_all_relays,
            }),
            presets,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.relay_url.clone(),
            config.use_all_relays,
            config.preset_relays.clone(),
        )
    }

    pub fn params(&self) -> RoutingParams {
        self.params.read().clone()
    }

    pub fn presets(&self) -> &[PresetRelay] {
        &self.presets
    }

    /// Swap the routing parameters; returns whether anything changed.
    pub fn set_params(&self, primary: &str, use_all_relays: bool) -> bool {
        let mut params = self.params.write();
        let changed = params.primary != primary || params.use_all_relays != use_all_relays;
        params.primary = primary.to_string();
        params.use_all_relays = use_all_relays;
        changed
    }

    /// Relay URL -> filters to send there.
    ///
    /// Single mode reads only from the primary. All mode reads from every
    /// preset plus the primary, each with the same filters.
    pub fn route_query(&self, filters: &[QueryFilter]) -> HashMap<String, Vec<QueryFilter>> {
        let params = self.params();
        let mut routes = HashMap::new();

        if params.use_all_relays {
            for preset in &self.presets {
                routes.insert(preset.url.clone(), filters.to_vec());
            }
        }
        routes.insert(params.primary, filters.to_vec());

        routes
    }

    /// Relays a record is published to: the primary, then presets in order,
    /// at most [`MAX_PUBLISH_RELAYS`] distinct URLs.
    pub fn route_publish(&self, _record: &Record) -> Vec<String> {
        let params = self.params();
        let mut targets = vec![params.primary];

        for preset in &self.presets {
            if targets.len() >= MAX_PUBLISH_RELAYS {
                break;
            }
            if !targets.contains(&preset.url) {
                targets.push(preset.url.clone());
            }
        }

        targets
    }
}
