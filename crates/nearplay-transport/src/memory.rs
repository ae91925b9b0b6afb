//! In-process transport implementation.
//!
//! Every [`MemoryTransport`] joined to the same [`MemoryNetwork`] behaves
//! like a nearby device: it can advertise, discover advertisers with a
//! matching service id, negotiate connections and exchange payloads.
//! Events are queued on each device's channel in the order the radio
//! would report them, so tests and demos can drive session managers
//! deterministically without real hardware.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::{Mutex, mpsc};

use crate::{
    AdvertisingOptions, ConnectionStatusCode, DiscoveryOptions, EndpointId,
    EventReceiver, EventSender, Transport, TransportError, TransportEvent,
};

/// Length of generated endpoint ids.
const ENDPOINT_ID_LEN: usize = 4;

/// Status code reported to the peer when a negotiation is torn down
/// before both sides accepted.
const STATUS_NEGOTIATION_ABORTED: i32 = 8012;

struct Advertisement {
    display_name: String,
    service_id: String,
}

/// One device on the network.
struct Node {
    events: EventSender,
    advertising: Option<Advertisement>,
    discovering: Option<String>,
    links: HashSet<EndpointId>,
    /// In-flight negotiations. The value records whether THIS side has
    /// already accepted.
    pending: HashMap<EndpointId, bool>,
}

impl Node {
    fn new(events: EventSender) -> Self {
        Self {
            events,
            advertising: None,
            discovering: None,
            links: HashSet::new(),
            pending: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct NetworkInner {
    nodes: HashMap<EndpointId, Node>,
}

impl NetworkInner {
    fn emit(&self, to: &EndpointId, event: TransportEvent) {
        if let Some(node) = self.nodes.get(to) {
            // A dropped receiver means the owner went away.
            let _ = node.events.send(event);
        }
    }

    fn node_mut(
        &mut self,
        id: &EndpointId,
    ) -> Result<&mut Node, TransportError> {
        self.nodes.get_mut(id).ok_or(TransportError::Shutdown)
    }

    fn fresh_id(&self) -> EndpointId {
        let mut rng = rand::rng();
        loop {
            let id: String = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(ENDPOINT_ID_LEN)
                .map(char::from)
                .collect();
            let id = EndpointId::new(id);
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Endpoints (other than `me`) currently discovering `service_id`.
    fn discoverers_of(
        &self,
        me: &EndpointId,
        service_id: &str,
    ) -> Vec<EndpointId> {
        self.nodes
            .iter()
            .filter(|(id, node)| {
                *id != me && node.discovering.as_deref() == Some(service_id)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn stop_advertising(&mut self, me: &EndpointId) {
        let Some(ad) = self
            .nodes
            .get_mut(me)
            .and_then(|node| node.advertising.take())
        else {
            return;
        };
        for watcher in self.discoverers_of(me, &ad.service_id) {
            self.emit(
                &watcher,
                TransportEvent::EndpointLost {
                    endpoint: me.clone(),
                },
            );
        }
        tracing::debug!(endpoint = %me, service_id = %ad.service_id, "advertising stopped");
    }

    fn drop_link(&mut self, me: &EndpointId, remote: &EndpointId) {
        let had_link = self
            .nodes
            .get_mut(me)
            .is_some_and(|node| node.links.remove(remote));
        if !had_link {
            return;
        }
        if let Some(node) = self.nodes.get_mut(remote) {
            node.links.remove(me);
        }
        self.emit(
            remote,
            TransportEvent::Disconnected {
                endpoint: me.clone(),
            },
        );
        tracing::debug!(endpoint = %me, %remote, "link dropped");
    }

    fn abort_pending(&mut self, me: &EndpointId, remote: &EndpointId) {
        let was_pending = self
            .nodes
            .get_mut(me)
            .is_some_and(|node| node.pending.remove(remote).is_some());
        if !was_pending {
            return;
        }
        if let Some(node) = self.nodes.get_mut(remote) {
            node.pending.remove(me);
        }
        self.emit(
            remote,
            TransportEvent::ConnectionResult {
                endpoint: me.clone(),
                status: ConnectionStatusCode::Error(STATUS_NEGOTIATION_ABORTED),
            },
        );
    }

    fn stop_all(&mut self, me: &EndpointId) {
        let (links, pending) = match self.nodes.get(me) {
            Some(node) => (
                node.links.iter().cloned().collect::<Vec<_>>(),
                node.pending.keys().cloned().collect::<Vec<_>>(),
            ),
            None => return,
        };
        for remote in &links {
            self.drop_link(me, remote);
        }
        for remote in &pending {
            self.abort_pending(me, remote);
        }
        self.stop_advertising(me);
        if let Some(node) = self.nodes.get_mut(me) {
            node.discovering = None;
        }
    }
}

/// A shared, in-process "radio space".
///
/// Cloning is cheap; clones refer to the same network.
///
/// ```rust
/// use nearplay_transport::{AdvertisingOptions, MemoryNetwork, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let network = MemoryNetwork::new();
/// let (host, _host_events) = network.join().await;
/// host.start_advertising("table", "svc", AdvertisingOptions::default())
///     .await
///     .unwrap();
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new device to the network.
    ///
    /// Returns the device's transport handle together with the receiving
    /// end of its event channel.
    pub async fn join(&self) -> (MemoryTransport, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        let local = inner.fresh_id();
        inner.nodes.insert(local.clone(), Node::new(tx));
        tracing::debug!(endpoint = %local, "device joined memory network");

        let transport = MemoryTransport {
            local,
            inner: Arc::clone(&self.inner),
        };
        (transport, rx)
    }

    /// Number of devices currently on the network.
    pub async fn device_count(&self) -> usize {
        self.inner.lock().await.nodes.len()
    }
}

/// One device's handle onto a [`MemoryNetwork`].
pub struct MemoryTransport {
    local: EndpointId,
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryTransport {
    /// Takes the device off the network, as if it went out of range.
    ///
    /// Peers linked to it receive `Disconnected`, discoverers receive
    /// `EndpointLost`. Every later call on this handle fails with
    /// [`TransportError::Shutdown`] or is a no-op.
    pub async fn leave(&self) {
        let mut inner = self.inner.lock().await;
        inner.stop_all(&self.local);
        inner.nodes.remove(&self.local);
        tracing::debug!(endpoint = %self.local, "device left memory network");
    }
}

impl Transport for MemoryTransport {
    fn local_endpoint(&self) -> &EndpointId {
        &self.local
    }

    async fn start_discovery(
        &self,
        service_id: &str,
        options: DiscoveryOptions,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let node = inner.node_mut(&self.local)?;
        if node.discovering.is_some() {
            return Err(TransportError::AlreadyDiscovering);
        }
        node.discovering = Some(service_id.to_owned());

        let found: Vec<(EndpointId, String)> = inner
            .nodes
            .iter()
            .filter(|(id, _)| **id != self.local)
            .filter_map(|(id, node)| {
                let ad = node.advertising.as_ref()?;
                (ad.service_id == service_id)
                    .then(|| (id.clone(), ad.display_name.clone()))
            })
            .collect();
        for (endpoint, name) in found {
            inner.emit(
                &self.local,
                TransportEvent::EndpointFound {
                    endpoint,
                    name,
                    service_id: service_id.to_owned(),
                },
            );
        }

        tracing::debug!(
            endpoint = %self.local,
            service_id,
            strategy = ?options.strategy,
            "discovery started"
        );
        Ok(())
    }

    async fn stop_discovery(&self) {
        let mut inner = self.inner.lock().await;
        if let Ok(node) = inner.node_mut(&self.local) {
            node.discovering = None;
        }
    }

    async fn start_advertising(
        &self,
        display_name: &str,
        service_id: &str,
        options: AdvertisingOptions,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let node = inner.node_mut(&self.local)?;
        if node.advertising.is_some() {
            return Err(TransportError::AlreadyAdvertising);
        }
        node.advertising = Some(Advertisement {
            display_name: display_name.to_owned(),
            service_id: service_id.to_owned(),
        });

        for watcher in inner.discoverers_of(&self.local, service_id) {
            inner.emit(
                &watcher,
                TransportEvent::EndpointFound {
                    endpoint: self.local.clone(),
                    name: display_name.to_owned(),
                    service_id: service_id.to_owned(),
                },
            );
        }

        tracing::debug!(
            endpoint = %self.local,
            display_name,
            service_id,
            strategy = ?options.strategy,
            "advertising started"
        );
        Ok(())
    }

    async fn stop_advertising(&self) {
        self.inner.lock().await.stop_advertising(&self.local);
    }

    async fn request_connection(
        &self,
        display_name: &str,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if *endpoint == self.local {
            return Err(TransportError::UnknownEndpoint(endpoint.clone()));
        }
        let remote_name = inner
            .nodes
            .get(endpoint)
            .and_then(|node| node.advertising.as_ref())
            .map(|ad| ad.display_name.clone())
            .ok_or_else(|| TransportError::UnknownEndpoint(endpoint.clone()))?;

        let node = inner.node_mut(&self.local)?;
        if node.links.contains(endpoint) {
            return Err(TransportError::AlreadyConnected(endpoint.clone()));
        }
        if node.pending.contains_key(endpoint) {
            return Err(TransportError::ConnectionPending(endpoint.clone()));
        }
        node.pending.insert(endpoint.clone(), false);
        if let Some(remote) = inner.nodes.get_mut(endpoint) {
            remote.pending.insert(self.local.clone(), false);
        }

        inner.emit(
            &self.local,
            TransportEvent::ConnectionInitiated {
                endpoint: endpoint.clone(),
                name: remote_name,
                incoming: false,
            },
        );
        inner.emit(
            endpoint,
            TransportEvent::ConnectionInitiated {
                endpoint: self.local.clone(),
                name: display_name.to_owned(),
                incoming: true,
            },
        );
        Ok(())
    }

    async fn accept_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let node = inner.node_mut(&self.local)?;
        let accepted = node.pending.get_mut(endpoint).ok_or_else(|| {
            TransportError::NoPendingConnection(endpoint.clone())
        })?;
        *accepted = true;

        let remote_accepted = inner
            .nodes
            .get(endpoint)
            .and_then(|node| node.pending.get(&self.local))
            .copied()
            .unwrap_or(false);
        if !remote_accepted {
            return Ok(());
        }

        // Both sides agreed: promote the negotiation to a link.
        if let Some(node) = inner.nodes.get_mut(&self.local) {
            node.pending.remove(endpoint);
            node.links.insert(endpoint.clone());
        }
        if let Some(node) = inner.nodes.get_mut(endpoint) {
            node.pending.remove(&self.local);
            node.links.insert(self.local.clone());
        }
        inner.emit(
            endpoint,
            TransportEvent::ConnectionResult {
                endpoint: self.local.clone(),
                status: ConnectionStatusCode::Ok,
            },
        );
        inner.emit(
            &self.local,
            TransportEvent::ConnectionResult {
                endpoint: endpoint.clone(),
                status: ConnectionStatusCode::Ok,
            },
        );
        tracing::debug!(endpoint = %self.local, remote = %endpoint, "link established");
        Ok(())
    }

    async fn reject_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let node = inner.node_mut(&self.local)?;
        if node.pending.remove(endpoint).is_none() {
            return Err(TransportError::NoPendingConnection(endpoint.clone()));
        }
        if let Some(remote) = inner.nodes.get_mut(endpoint) {
            remote.pending.remove(&self.local);
        }
        inner.emit(
            endpoint,
            TransportEvent::ConnectionResult {
                endpoint: self.local.clone(),
                status: ConnectionStatusCode::Rejected,
            },
        );
        inner.emit(
            &self.local,
            TransportEvent::ConnectionResult {
                endpoint: endpoint.clone(),
                status: ConnectionStatusCode::Rejected,
            },
        );
        Ok(())
    }

    async fn send_payload(
        &self,
        endpoints: &[EndpointId],
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let inner = self.inner.lock().await;
        let node = inner
            .nodes
            .get(&self.local)
            .ok_or(TransportError::Shutdown)?;

        let mut missing = None;
        for endpoint in endpoints {
            if node.links.contains(endpoint) {
                inner.emit(
                    endpoint,
                    TransportEvent::PayloadReceived {
                        endpoint: self.local.clone(),
                        bytes: bytes.to_vec(),
                    },
                );
            } else if missing.is_none() {
                missing = Some(endpoint.clone());
            }
        }

        match missing {
            Some(endpoint) => Err(TransportError::NotConnected(endpoint)),
            None => Ok(()),
        }
    }

    async fn disconnect_from_endpoint(&self, endpoint: &EndpointId) {
        let mut inner = self.inner.lock().await;
        inner.drop_link(&self.local, endpoint);
        inner.abort_pending(&self.local, endpoint);
    }

    async fn stop_all_endpoints(&self) {
        self.inner.lock().await.stop_all(&self.local);
    }
}
