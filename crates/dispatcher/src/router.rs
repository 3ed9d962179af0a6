//! Router - resolves a set of destination ids into one consumer

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use contracts::{Consumer, ContractError, DestinationId};

use crate::fanout;

/// Fixed mapping of destinations plus a cache of built fan-outs.
///
/// Cache keys are the sorted, deduplicated id lists; entries live as long as
/// the router.
pub struct Router {
    consumers: HashMap<DestinationId, Arc<dyn Consumer>>,
    cache: DashMap<Vec<DestinationId>, Arc<dyn Consumer>>,
}

impl Router {
    pub fn new(consumers: HashMap<DestinationId, Arc<dyn Consumer>>) -> Self {
        Self {
            consumers,
            cache: DashMap::new(),
        }
    }

    /// Resolve `ids` (any order, duplicates allowed) into a single consumer.
    ///
    /// Destinations are wired in id order, so readers of a fan-out are
    /// always called in that order.
    ///
    /// # Errors
    /// - `NoDestinations` when `ids` is empty
    /// - `UnknownDestination` when any id is not configured; nothing is built
    #[instrument(name = "router_resolve", skip_all)]
    pub fn resolve<I, T>(&self, ids: I) -> Result<Arc<dyn Consumer>, ContractError>
    where
        I: IntoIterator<Item = T>,
        T: Into<DestinationId>,
    {
        let key: Vec<DestinationId> = ids
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if key.is_empty() {
            return Err(ContractError::NoDestinations);
        }
        if let Some(unknown) = key.iter().find(|id| !self.consumers.contains_key(*id)) {
            return Err(ContractError::unknown_destination(unknown.as_str()));
        }

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        // Built under the entry's shard lock: concurrent misses build once
        let entry = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| self.build(&key));
        Ok(Arc::clone(entry.value()))
    }

    fn build(&self, key: &[DestinationId]) -> Arc<dyn Consumer> {
        let consumers = key
            .iter()
            .filter_map(|id| self.consumers.get(id).cloned())
            .collect();
        debug!(destinations = ?key, "Built route consumer");
        fanout::build(consumers)
    }

    /// Configured destination ids, sorted
    pub fn list_destinations(&self) -> Vec<DestinationId> {
        let mut ids: Vec<_> = self.consumers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of distinct routes resolved so far
    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }
}
