//! End-to-end request scenarios against a loopback server

mod common;

use common::*;
use std::thread;
use std::time::{Duration, Instant};
use x11core::server::ServerConfig;

const STRUCTURE_NOTIFY: u32 = 0x0002_0000;
const SUBSTRUCTURE_NOTIFY: u32 = 0x0008_0000;
const STRING: u32 = 31;

fn change_property(window: u32, property: u32, type_: u32, value: &[u8]) -> Vec<u8> {
    let mut body = u32s(&[window, property, type_]);
    body.extend_from_slice(&[8, 0, 0, 0]);
    body.extend_from_slice(&u32s(&[value.len() as u32]));
    body.extend_from_slice(value);
    body
}

#[test]
fn test_map_notify_reaches_structure_subscribers() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut watcher = TestClient::connect(addr);
    let mut client = TestClient::connect(addr);

    // Watch the root for substructure changes
    watcher.send(2, 0, &u32s(&[ROOT, 0x800, SUBSTRUCTURE_NOTIFY]));
    watcher.get_input_focus();

    let window = client.id_base();
    client.create_window(window, ROOT, 100, 100, STRUCTURE_NOTIFY);
    client.send(8, 0, &u32s(&[window]));
    let (reply, events) = client.sync();
    assert_eq!(reply[0], 1);
    let map = events
        .iter()
        .find(|e| e[0] & 0x7F == MAP_NOTIFY)
        .expect("MapNotify on the window itself");
    assert_eq!(u32_at(map, 4), window);
    assert_eq!(u32_at(map, 8), window);
    assert_eq!(u16_at(map, 2), 2, "sequence of MapWindow");

    // CreateNotify arrives first, then MapNotify
    let mut seen = Vec::new();
    while seen.last() != Some(&MAP_NOTIFY) {
        let event = watcher.read_packet();
        seen.push(event[0] & 0x7F);
        if event[0] & 0x7F == MAP_NOTIFY {
            assert_eq!(u32_at(&event, 4), ROOT);
            assert_eq!(u32_at(&event, 8), window);
        }
    }
    assert_eq!(seen, vec![16, MAP_NOTIFY]);
}

#[test]
fn test_property_round_trip() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let window = client.id_base() + 1;
    client.create_window(window, ROOT, 50, 50, 0);

    let atom = client.intern_atom("X11CORE_TEST");
    assert!(atom > 68, "new atoms follow the predefined ones");
    client.send(18, 0, &change_property(window, atom, STRING, b"hello"));
    client.send(20, 0, &u32s(&[window, atom, 0, 0, 100]));

    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(reply[1], 8, "format");
    assert_eq!(u32_at(&reply, 8), STRING);
    assert_eq!(u32_at(&reply, 12), 0, "bytes after");
    assert_eq!(u32_at(&reply, 16), 5);
    assert_eq!(&reply[32..37], b"hello");

    // ListProperties sees it too
    client.send(21, 0, &u32s(&[window]));
    let (reply, _) = client.read_response();
    assert_eq!(u16_at(&reply, 8), 1);
    assert_eq!(u32_at(&reply, 32), atom);
}

#[test]
fn test_concurrent_get_input_focus() {
    const ROUNDS: u16 = 200;
    let (addr, _server) = start_server(ServerConfig::default());

    let workers: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(move || {
                let mut client = TestClient::connect(addr);
                for _ in 0..ROUNDS {
                    client.send(43, 0, &[]);
                }
                for seq in 1..=ROUNDS {
                    let reply = client.read_packet();
                    assert_eq!(reply.len(), 32);
                    assert_eq!(reply[0], 1);
                    assert_eq!(reply[1], 1, "revert to PointerRoot");
                    assert_eq!(u16_at(&reply, 2), seq);
                    assert_eq!(u32_at(&reply, 4), 0);
                    assert_eq!(u32_at(&reply, 8), 1, "focus is PointerRoot");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("client thread");
    }
}

#[test]
fn test_big_requests() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);

    let name = b"BIG-REQUESTS";
    let mut body = vec![name.len() as u8, 0, 0, 0];
    body.extend_from_slice(name);
    client.send(98, 0, &body);
    let (reply, _) = client.read_response();
    assert_eq!(reply[8], 1, "present");
    let major = reply[9];
    assert_eq!(major, 128);

    client.send(major, 0, &[]);
    let (reply, _) = client.read_response();
    assert_eq!(u32_at(&reply, 8), 0x3F_FFFF);

    let window = client.id_base() + 2;
    client.create_window(window, ROOT, 20, 20, 0);
    let value: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    client.send_big(18, 0, &change_property(window, 39, STRING, &value));
    client.send(20, 0, &u32s(&[window, 39, STRING, 0, 100_000]));

    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(u32_at(&reply, 16), 300_000);
    assert_eq!(&reply[32..32 + value.len()], &value[..]);
}

#[test]
fn test_error_replaces_reply_and_connection_continues() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);

    client.send(8, 0, &u32s(&[0x0BAD]));
    let (error, _) = client.read_response();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 3, "Window error");
    assert_eq!(u16_at(&error, 2), 1);
    assert_eq!(u32_at(&error, 4), 0x0BAD);
    assert_eq!(u16_at(&error, 8), 0);
    assert_eq!(error[10], 8);

    let reply = client.get_input_focus();
    assert_eq!(reply[0], 1);
    assert_eq!(u16_at(&reply, 2), 2);
}

#[test]
fn test_unknown_opcode_ignored_by_default() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    // ChangeSaveSet has no handler
    client.send(6, 0, &u32s(&[ROOT]));
    let reply = client.get_input_focus();
    assert_eq!(reply[0], 1);
    assert_eq!(u16_at(&reply, 2), 2);
}

#[test]
fn test_unknown_opcode_closes_in_strict_mode() {
    let config = ServerConfig {
        strict_opcodes: true,
        ..ServerConfig::default()
    };
    let (addr, _server) = start_server(config);
    let mut client = TestClient::connect(addr);
    client.send(6, 0, &u32s(&[ROOT]));
    let error = client.read_packet();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 1, "Request error");
    assert_eq!(error[10], 6);
    assert!(client.is_closed());
}

#[test]
fn test_disconnect_leaves_connection_set() {
    let (addr, server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    client.get_input_focus();
    assert_eq!(server.client_count(), 1);
    drop(client);

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.client_count() != 0 {
        assert!(Instant::now() < deadline, "client still registered");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_stalled_event_reader_does_not_block_others() {
    let (addr, server) = start_server(ServerConfig::default());
    let mut watcher = TestClient::connect(addr);
    let mut churner = TestClient::connect(addr);
    let mut bystander = TestClient::connect(addr);

    // Subscribe, then never read again
    watcher.send(2, 0, &u32s(&[ROOT, 0x800, SUBSTRUCTURE_NOTIFY]));
    watcher.get_input_focus();

    // Each pair queues 64 bytes of events for the watcher, far more than
    // the socket buffers hold
    let window = churner.id_base() + 1;
    for _ in 0..30_000 {
        churner.create_window(window, ROOT, 10, 10, 0);
        churner.send(4, 0, &u32s(&[window]));
    }
    let (reply, _) = churner.sync();
    assert_eq!(reply[0], 1);

    bystander.send(14, 0, &u32s(&[ROOT]));
    let (reply, _) = bystander.read_response();
    assert_eq!(reply[0], 1, "GetGeometry answered");
    assert_eq!(u32_at(&reply, 8), ROOT);
    assert_eq!(server.client_count(), 3);
}

#[test]
fn test_ids_are_unique_across_resource_kinds() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let id = client.id_base() + 7;
    client.create_window(id, ROOT, 20, 20, 0);

    // CreateGC on the window's id
    client.send(55, 0, &u32s(&[id, ROOT, 0]));
    let (error, _) = client.read_response();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 14, "IDChoice error");
    assert_eq!(u32_at(&error, 4), id);
    assert_eq!(error[10], 55);

    // OpenFont on the window's id
    let mut open = u32s(&[id]);
    open.extend_from_slice(&[5, 0, 0, 0]);
    open.extend_from_slice(b"fixed");
    client.send(45, 0, &open);
    let (error, _) = client.read_response();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 14, "IDChoice error");
    assert_eq!(error[10], 45);

    // Destroying the window frees the id for any kind
    client.send(4, 0, &u32s(&[id]));
    client.send(55, 0, &u32s(&[id, ROOT, 0]));
    let (reply, events) = client.sync();
    assert_eq!(reply[0], 1, "no error for the reused id");
    assert!(events.is_empty());
}

#[test]
fn test_new_selection_owner_clears_previous() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut first = TestClient::connect(addr);
    let mut second = TestClient::connect(addr);
    let selection = first.intern_atom("CLIPBOARD");

    let first_window = first.id_base() + 1;
    first.create_window(first_window, ROOT, 10, 10, 0);
    first.send(22, 0, &u32s(&[first_window, selection, 0]));
    first.sync();

    let second_window = second.id_base() + 1;
    second.create_window(second_window, ROOT, 10, 10, 0);
    second.send(22, 0, &u32s(&[second_window, selection, 0]));
    second.sync();

    let clear = first.read_packet();
    assert_eq!(clear[0] & 0x7F, 29, "SelectionClear");
    assert_eq!(u32_at(&clear, 8), first_window);
    assert_eq!(u32_at(&clear, 12), selection);

    second.send(23, 0, &u32s(&[selection]));
    let (reply, _) = second.read_response();
    assert_eq!(u32_at(&reply, 8), second_window);
}

#[test]
fn test_convert_unowned_selection_refuses() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let selection = client.intern_atom("NOBODY_OWNS_THIS");
    let property = client.intern_atom("XSEL_DATA");
    let requestor = client.id_base() + 1;
    client.create_window(requestor, ROOT, 10, 10, 0);

    client.send(24, 0, &u32s(&[requestor, selection, STRING, property, 0]));
    let (_, events) = client.sync();
    let notify = events
        .iter()
        .find(|e| e[0] & 0x7F == 31)
        .expect("SelectionNotify");
    assert_eq!(u32_at(notify, 8), requestor);
    assert_eq!(u32_at(notify, 12), selection);
    assert_eq!(u32_at(notify, 16), STRING);
    assert_eq!(u32_at(notify, 20), 0, "property None");
}
