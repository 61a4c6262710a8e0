use crate::geocoding::{BatchDispatcher, ProviderAggregator};

pub struct AppState {
    pub aggregator: ProviderAggregator,
    pub dispatcher: BatchDispatcher,
}

impl AppState {
    pub fn new(aggregator: ProviderAggregator, dispatcher: BatchDispatcher) -> Self {
        Self {
            aggregator,
            dispatcher,
        }
    }
}
