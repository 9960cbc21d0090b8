//! Single-flight request dispatch.

use crate::error::TransportError;
use crate::transport::{HttpRequest, Transport};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

type Response = BoxFuture<'static, Result<Vec<u8>, TransportError>>;

struct InFlight<T> {
    tag: T,
    response: Response,
}

/// Runs at most one handshake request at a time.
///
/// Each request carries a tag `T` identifying what the caller should do
/// with the response once it arrives.
pub struct RequestExecutor<T> {
    transport: Arc<dyn Transport>,
    in_flight: Option<InFlight<T>>,
}

impl<T> RequestExecutor<T> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            in_flight: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start `request`. Returns `false` without sending anything if another
    /// request is still in flight.
    pub fn dispatch(&mut self, tag: T, request: HttpRequest) -> bool {
        if self.in_flight.is_some() {
            return false;
        }

        debug!(url = %request.url, "Dispatching request");
        let transport = Arc::clone(&self.transport);
        let response = Box::pin(async move { transport.send(request).await });
        self.in_flight = Some(InFlight { tag, response });
        true
    }

    /// Wait for the in-flight request to finish, or return `None` when idle.
    ///
    /// Cancel safe: dropping the future before it resolves leaves the request
    /// in flight. The slot is released before the outcome is handed back.
    pub async fn completion(&mut self) -> Option<(T, Result<Vec<u8>, TransportError>)> {
        let in_flight = self.in_flight.as_mut()?;
        let result = in_flight.response.as_mut().await;
        let InFlight { tag, .. } = self.in_flight.take()?;
        Some((tag, result))
    }
}
