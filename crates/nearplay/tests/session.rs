//! End-to-end tests: client and server managers talking over the
//! in-memory transport.

use std::sync::{Arc, Mutex};

use nearplay::prelude::*;
use serde_json::json;

const SERVICE: &str = "nearplay.test";

type Sink<A> = Arc<Mutex<Vec<A>>>;

struct Host {
    manager: ServerManager<MemoryTransport>,
    events: EventReceiver,
    actions: Sink<ClientAction>,
}

struct Guest {
    manager: ClientManager<MemoryTransport>,
    events: EventReceiver,
    actions: Sink<ServerAction>,
}

async fn host(network: &MemoryNetwork, role: ServerRole, max_connections: usize) -> Host {
    let (transport, events) = network.join().await;
    let actions = Sink::default();
    let sink = Arc::clone(&actions);
    let mut manager = ServerManager::new(transport, move |action| {
        sink.lock().unwrap().push(action);
    });
    manager
        .start_server(
            SERVICE,
            ServerConfiguration {
                role,
                max_connections,
                ..ServerConfiguration::default()
            },
        )
        .await;
    Host {
        manager,
        events,
        actions,
    }
}

async fn guest(network: &MemoryNetwork, nickname: &str) -> Guest {
    let (transport, events) = network.join().await;
    let actions = Sink::default();
    let sink = Arc::clone(&actions);
    let mut manager = ClientManager::new(transport, move |action| {
        sink.lock().unwrap().push(action);
    });
    manager
        .connect(SERVICE, PlayerConnectionState::new(nickname, None))
        .await;
    Guest {
        manager,
        events,
        actions,
    }
}

impl Guest {
    async fn pump(&mut self) -> usize {
        self.manager.pump(&mut self.events).await
    }

    fn id(&self) -> EndpointId {
        self.manager.transport().local_endpoint().clone()
    }
}

impl Host {
    async fn pump(&mut self) -> usize {
        self.manager.pump(&mut self.events).await
    }
}

/// Pumps everybody until no events are left anywhere.
async fn settle(host: &mut Host, guests: &mut [&mut Guest]) {
    loop {
        let mut handled = host.pump().await;
        for guest in guests.iter_mut() {
            handled += guest.pump().await;
        }
        if handled == 0 {
            break;
        }
    }
}

#[tokio::test]
async fn test_two_players_join_and_introduce_themselves() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Player, 4).await;
    let mut ann = guest(&network, "Ann").await;
    let mut bo = guest(&network, "Bo").await;

    settle(&mut table, &mut [&mut ann, &mut bo]).await;

    for guest in [&ann, &bo] {
        let state = guest.manager.state();
        assert_eq!(state.status, ConnectionStatus::ConnectionEstablished);
        assert_eq!(state.server_role, ServerRole::Player);
    }
    assert_eq!(table.manager.state().connected_count(), 2);

    let players: Vec<PlayerState> = table
        .actions
        .lock()
        .unwrap()
        .iter()
        .filter_map(|action| match action {
            ClientAction::EstablishConnection(endpoint, bytes) => {
                let envelope =
                    decode::<ClientPayloadType, PlayerConnectionState>(bytes, None).ok()?;
                Some(PlayerState::from_connection(endpoint.clone(), envelope.body?))
            }
            _ => None,
        })
        .collect();
    let mut names: Vec<&str> = players.iter().map(|p| p.nickname.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Ann", "Bo"]);
    assert!(players.iter().any(|p| p.id == ann.id()));
}

#[tokio::test]
async fn test_room_full_race_turns_away_second_player() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Table, 1).await;
    let mut ann = guest(&network, "Ann").await;
    let mut bo = guest(&network, "Bo").await;

    // Both requests are in flight before the host handles anything.
    ann.pump().await;
    bo.pump().await;
    settle(&mut table, &mut [&mut ann, &mut bo]).await;

    assert_eq!(table.manager.state().connected_endpoints, vec![ann.id()]);
    assert_eq!(
        ann.manager.state().status,
        ConnectionStatus::ConnectionEstablished
    );
    assert_eq!(bo.manager.state().status, ConnectionStatus::RoomIsFull);
    assert!(bo.actions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_broadcast_game_state_reaches_every_player() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Table, 2).await;
    let mut ann = guest(&network, "Ann").await;
    let mut bo = guest(&network, "Bo").await;
    settle(&mut table, &mut [&mut ann, &mut bo]).await;

    let text = ResourceText::PluralResource {
        res_id: 12,
        quantity: 2,
        args: vec![json!("Ann"), json!(2)],
    };
    table
        .manager
        .broadcast_envelope(&ServerPayloadType::UpdateGameState, Some(&text), None)
        .await
        .unwrap();
    settle(&mut table, &mut [&mut ann, &mut bo]).await;

    for guest in [&ann, &bo] {
        let actions = guest.actions.lock().unwrap();
        assert_eq!(actions.len(), 1);
        let ServerAction::UpdateGameState(bytes) = &actions[0] else {
            panic!("expected game state, got {:?}", actions[0]);
        };
        let envelope = decode::<ServerPayloadType, ResourceText>(bytes, None).unwrap();
        assert_eq!(envelope.body, Some(text.clone()));
    }
}

#[tokio::test]
async fn test_custom_client_payload_reaches_host_as_payload_action() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Table, 2).await;
    let mut ann = guest(&network, "Ann").await;
    settle(&mut table, &mut [&mut ann]).await;
    table.actions.lock().unwrap().clear();

    ann.manager
        .send_envelope(&"PLACE_MARK", Some(&json!({"row": 1, "col": 2})), None)
        .await
        .unwrap();
    settle(&mut table, &mut [&mut ann]).await;

    let actions = table.actions.lock().unwrap();
    let [ClientAction::PayloadAction(from, bytes)] = actions.as_slice() else {
        panic!("expected one payload action, got {actions:?}");
    };
    assert_eq!(*from, ann.id());
    let envelope = decode::<String, serde_json::Value>(bytes, None).unwrap();
    assert_eq!(envelope.tag, "PLACE_MARK");
}

#[tokio::test]
async fn test_client_disconnect_is_seen_by_host_once() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Table, 2).await;
    let mut ann = guest(&network, "Ann").await;
    settle(&mut table, &mut [&mut ann]).await;
    let ann_id = ann.id();

    ann.manager
        .send_envelope::<_, ()>(&ClientPayloadType::ActionDisconnected, None, None)
        .await
        .unwrap();
    ann.manager.disconnect().await;
    settle(&mut table, &mut [&mut ann]).await;

    assert_eq!(ann.manager.state().status, ConnectionStatus::Disconnected);
    assert_eq!(table.manager.state().connected_count(), 0);
    let disconnects = table
        .actions
        .lock()
        .unwrap()
        .iter()
        .filter(|action| **action == ClientAction::Disconnect(ann_id.clone()))
        .count();
    assert_eq!(disconnects, 1);
}

#[tokio::test]
async fn test_close_server_disconnects_players_and_allows_rejoin() {
    let network = MemoryNetwork::new();
    let mut table = host(&network, ServerRole::Table, 2).await;
    let mut ann = guest(&network, "Ann").await;
    settle(&mut table, &mut [&mut ann]).await;

    table.manager.close_server().await;
    settle(&mut table, &mut [&mut ann]).await;

    assert_eq!(table.manager.state().status, ServerStatus::Closed);
    assert_eq!(ann.manager.state().status, ConnectionStatus::Disconnected);

    table
        .manager
        .start_server(SERVICE, ServerConfiguration::default())
        .await;
    ann.manager
        .connect(SERVICE, PlayerConnectionState::new("Ann", None))
        .await;
    settle(&mut table, &mut [&mut ann]).await;

    assert_eq!(
        ann.manager.state().status,
        ConnectionStatus::ConnectionEstablished
    );
    assert_eq!(table.manager.state().connected_endpoints, vec![ann.id()]);
}
