//! Integration tests for the in-memory transport.
//!
//! Each test puts two or three "devices" on one `MemoryNetwork` and
//! checks that the events each device sees match what a proximity radio
//! would report: discovery, negotiation, payloads and link loss.

#[cfg(feature = "memory")]
mod memory {
    use nearplay_transport::{
        AdvertisingOptions, ConnectionStatusCode, DiscoveryOptions,
        EndpointId, EventReceiver, MemoryNetwork, MemoryTransport, Transport,
        TransportError, TransportEvent,
    };

    /// Drains every event currently queued on `rx`.
    fn drain(rx: &mut EventReceiver) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn advertising_host(
        network: &MemoryNetwork,
    ) -> (MemoryTransport, EventReceiver) {
        let (host, rx) = network.join().await;
        host.start_advertising("table", "svc", AdvertisingOptions::default())
            .await
            .expect("host should advertise");
        (host, rx)
    }

    /// Runs a full negotiation between `client` and `host`.
    async fn link(
        client: &MemoryTransport,
        client_rx: &mut EventReceiver,
        host: &MemoryTransport,
        host_rx: &mut EventReceiver,
    ) {
        client
            .request_connection("ann", host.local_endpoint())
            .await
            .expect("request should succeed");
        client
            .accept_connection(host.local_endpoint())
            .await
            .expect("client accept");
        host.accept_connection(client.local_endpoint())
            .await
            .expect("host accept");
        drain(client_rx);
        drain(host_rx);
    }

    #[tokio::test]
    async fn test_discovery_sees_existing_advertiser() {
        let network = MemoryNetwork::new();
        let (host, _host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;

        client
            .start_discovery("svc", DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::EndpointFound {
                endpoint: host.local_endpoint().clone(),
                name: "table".into(),
                service_id: "svc".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_discovery_sees_later_advertiser_and_ignores_other_services() {
        let network = MemoryNetwork::new();
        let (client, mut client_rx) = network.join().await;
        client
            .start_discovery("svc", DiscoveryOptions::default())
            .await
            .unwrap();

        let (other, _rx) = network.join().await;
        other
            .start_advertising("other", "different", AdvertisingOptions::default())
            .await
            .unwrap();
        let (host, _host_rx) = advertising_host(&network).await;

        let events = drain(&mut client_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TransportEvent::EndpointFound { endpoint, .. } if endpoint == host.local_endpoint()
        ));
    }

    #[tokio::test]
    async fn test_stop_advertising_reports_endpoint_lost() {
        let network = MemoryNetwork::new();
        let (host, _host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        client
            .start_discovery("svc", DiscoveryOptions::default())
            .await
            .unwrap();
        drain(&mut client_rx);

        host.stop_advertising().await;

        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::EndpointLost {
                endpoint: host.local_endpoint().clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_request_connection_initiates_on_both_sides() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;

        client
            .request_connection("ann", host.local_endpoint())
            .await
            .unwrap();

        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::ConnectionInitiated {
                endpoint: host.local_endpoint().clone(),
                name: "table".into(),
                incoming: false,
            }]
        );
        assert_eq!(
            drain(&mut host_rx),
            vec![TransportEvent::ConnectionInitiated {
                endpoint: client.local_endpoint().clone(),
                name: "ann".into(),
                incoming: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_request_connection_to_non_advertiser_fails() {
        let network = MemoryNetwork::new();
        let (quiet, _rx) = network.join().await;
        let (client, _client_rx) = network.join().await;

        let result = client
            .request_connection("ann", quiet.local_endpoint())
            .await;

        assert_eq!(
            result,
            Err(TransportError::UnknownEndpoint(
                quiet.local_endpoint().clone()
            ))
        );
    }

    #[tokio::test]
    async fn test_connection_needs_both_accepts() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        client
            .request_connection("ann", host.local_endpoint())
            .await
            .unwrap();
        drain(&mut client_rx);
        drain(&mut host_rx);

        client.accept_connection(host.local_endpoint()).await.unwrap();
        assert!(drain(&mut client_rx).is_empty(), "one accept is not enough");

        host.accept_connection(client.local_endpoint()).await.unwrap();
        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::ConnectionResult {
                endpoint: host.local_endpoint().clone(),
                status: ConnectionStatusCode::Ok,
            }]
        );
        assert_eq!(
            drain(&mut host_rx),
            vec![TransportEvent::ConnectionResult {
                endpoint: client.local_endpoint().clone(),
                status: ConnectionStatusCode::Ok,
            }]
        );
    }

    #[tokio::test]
    async fn test_reject_connection_reports_rejected_to_both() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        client
            .request_connection("ann", host.local_endpoint())
            .await
            .unwrap();
        drain(&mut client_rx);
        drain(&mut host_rx);

        host.reject_connection(client.local_endpoint()).await.unwrap();

        assert!(matches!(
            drain(&mut client_rx).as_slice(),
            [TransportEvent::ConnectionResult { status: ConnectionStatusCode::Rejected, .. }]
        ));
        assert!(matches!(
            drain(&mut host_rx).as_slice(),
            [TransportEvent::ConnectionResult { status: ConnectionStatusCode::Rejected, .. }]
        ));
    }

    #[tokio::test]
    async fn test_send_payload_over_link() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        link(&client, &mut client_rx, &host, &mut host_rx).await;

        client
            .send_payload(&[host.local_endpoint().clone()], b"hello")
            .await
            .unwrap();

        assert_eq!(
            drain(&mut host_rx),
            vec![TransportEvent::PayloadReceived {
                endpoint: client.local_endpoint().clone(),
                bytes: b"hello".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn test_send_payload_without_link_fails() {
        let network = MemoryNetwork::new();
        let (host, _host_rx) = advertising_host(&network).await;
        let (client, _client_rx) = network.join().await;

        let result = client
            .send_payload(&[host.local_endpoint().clone()], b"hello")
            .await;

        assert_eq!(
            result,
            Err(TransportError::NotConnected(host.local_endpoint().clone()))
        );
    }

    #[tokio::test]
    async fn test_disconnect_notifies_only_the_remote_side() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        link(&client, &mut client_rx, &host, &mut host_rx).await;

        host.disconnect_from_endpoint(client.local_endpoint()).await;

        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::Disconnected {
                endpoint: host.local_endpoint().clone(),
            }]
        );
        assert!(drain(&mut host_rx).is_empty());
    }

    #[tokio::test]
    async fn test_stop_all_endpoints_drops_links_and_advertising() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        link(&client, &mut client_rx, &host, &mut host_rx).await;

        host.stop_all_endpoints().await;

        assert_eq!(
            drain(&mut client_rx),
            vec![TransportEvent::Disconnected {
                endpoint: host.local_endpoint().clone(),
            }]
        );
        // Advertising stopped as well, so a new client can't connect.
        let (late, _late_rx) = network.join().await;
        let result = late
            .request_connection("bob", host.local_endpoint())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_leave_disconnects_linked_peers() {
        let network = MemoryNetwork::new();
        let (host, mut host_rx) = advertising_host(&network).await;
        let (client, mut client_rx) = network.join().await;
        link(&client, &mut client_rx, &host, &mut host_rx).await;
        let client_id: EndpointId = client.local_endpoint().clone();

        client.leave().await;

        assert_eq!(
            drain(&mut host_rx),
            vec![TransportEvent::Disconnected { endpoint: client_id }]
        );
    }
}
