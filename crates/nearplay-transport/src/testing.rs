//! A scripted [`Transport`] that records every call.
//!
//! Session manager tests feed [`TransportEvent`](crate::TransportEvent)s
//! by hand and then assert on what the manager asked the transport to
//! do. Individual operations can be told to fail.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    AdvertisingOptions, DiscoveryOptions, EndpointId, Transport,
    TransportError,
};

/// One recorded call into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    StartDiscovery { service_id: String },
    StopDiscovery,
    StartAdvertising {
        display_name: String,
        service_id: String,
    },
    StopAdvertising,
    RequestConnection {
        display_name: String,
        endpoint: EndpointId,
    },
    AcceptConnection(EndpointId),
    RejectConnection(EndpointId),
    SendPayload {
        endpoints: Vec<EndpointId>,
        bytes: Vec<u8>,
    },
    DisconnectFromEndpoint(EndpointId),
    StopAllEndpoints,
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    StartDiscovery,
    StartAdvertising,
    RequestConnection,
    SendPayload,
}

/// A transport that does nothing but remember what it was asked.
pub struct RecordingTransport {
    local: EndpointId,
    calls: Mutex<Vec<TransportCall>>,
    failures: Mutex<HashSet<FailPoint>>,
}

impl RecordingTransport {
    pub fn new(local: impl Into<EndpointId>) -> Self {
        Self {
            local: local.into(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
        }
    }

    /// Makes every later call of `point` fail.
    pub fn fail(&self, point: FailPoint) {
        lock(&self.failures).insert(point);
    }

    /// Makes `point` succeed again.
    pub fn heal(&self, point: FailPoint) {
        lock(&self.failures).remove(&point);
    }

    /// Returns all calls so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    /// Returns and forgets all calls so far.
    pub fn take_calls(&self) -> Vec<TransportCall> {
        std::mem::take(&mut *lock(&self.calls))
    }

    /// Returns every `(targets, bytes)` pair passed to `send_payload`.
    pub fn sent_payloads(&self) -> Vec<(Vec<EndpointId>, Vec<u8>)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                TransportCall::SendPayload { endpoints, bytes } => {
                    Some((endpoints.clone(), bytes.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
    }

    fn check(&self, point: FailPoint) -> Result<(), TransportError> {
        if lock(&self.failures).contains(&point) {
            Err(TransportError::Shutdown)
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Transport for RecordingTransport {
    fn local_endpoint(&self) -> &EndpointId {
        &self.local
    }

    async fn start_discovery(
        &self,
        service_id: &str,
        _options: DiscoveryOptions,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::StartDiscovery {
            service_id: service_id.to_owned(),
        });
        self.check(FailPoint::StartDiscovery)
    }

    async fn stop_discovery(&self) {
        self.record(TransportCall::StopDiscovery);
    }

    async fn start_advertising(
        &self,
        display_name: &str,
        service_id: &str,
        _options: AdvertisingOptions,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::StartAdvertising {
            display_name: display_name.to_owned(),
            service_id: service_id.to_owned(),
        });
        self.check(FailPoint::StartAdvertising)
    }

    async fn stop_advertising(&self) {
        self.record(TransportCall::StopAdvertising);
    }

    async fn request_connection(
        &self,
        display_name: &str,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::RequestConnection {
            display_name: display_name.to_owned(),
            endpoint: endpoint.clone(),
        });
        self.check(FailPoint::RequestConnection)
    }

    async fn accept_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::AcceptConnection(endpoint.clone()));
        Ok(())
    }

    async fn reject_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::RejectConnection(endpoint.clone()));
        Ok(())
    }

    async fn send_payload(
        &self,
        endpoints: &[EndpointId],
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        self.record(TransportCall::SendPayload {
            endpoints: endpoints.to_vec(),
            bytes: bytes.to_vec(),
        });
        self.check(FailPoint::SendPayload)
    }

    async fn disconnect_from_endpoint(&self, endpoint: &EndpointId) {
        self.record(TransportCall::DisconnectFromEndpoint(endpoint.clone()));
    }

    async fn stop_all_endpoints(&self) {
        self.record(TransportCall::StopAllEndpoints);
    }
}
