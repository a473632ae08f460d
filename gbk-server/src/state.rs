//! Shared handler state.

use gbk_client::StoreClient;

/// Pools the routes run on. Cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Takes writes and `INFO`.
    pub master: StoreClient,
    /// Serves list reads.
    pub slave: StoreClient,
}

impl AppState {
    pub fn new(master: StoreClient, slave: StoreClient) -> Self {
        AppState { master, slave }
    }

    /// Closes both pools. Requests still in flight finish on their own
    /// connections.
    pub fn close(&self) {
        self.master.pool().close_all();
        self.slave.pool().close_all();
    }
}
