//! End-to-end exercise of the daemon loop over a real byte-stream transport
//! (a `UnixStream::pair()`), the Rust-native replacement for the original
//! C project's process-level daemon smoke test: no sockets on disk, no
//! external process, just the same [`keystored::session::run`] function a
//! listening daemon would run per accepted connection.

use std::os::unix::net::UnixStream;
use std::thread;

use keystore::key::Key;
use keystore::memory::MemoryBackend;
use keystore::wire;
use keystored::protocol::{status, Message, Procedure};
use maplit::hashset;

/// Spawn the server half of `run` on its own thread against a backend
/// pre-populated with a couple of keys, and return the client half of the
/// pair along with the join handle.
fn spawn_session(backend: MemoryBackend) -> (UnixStream, thread::JoinHandle<()>) {
    let (client, mut server) = UnixStream::pair().expect("unix socket pair");
    let handle = thread::spawn(move || {
        let mut backend = backend;
        keystored::session::run(&mut server, &mut backend).ok();
    });
    (client, handle)
}

fn send_request(client: &mut UnixStream, procedure: Procedure, payload: Vec<u8>) -> Message {
    let request = Message::request(procedure, payload);
    request.write(client).unwrap();
    Message::read(client).unwrap()
}

#[test]
fn get_key_round_trips_over_the_wire() {
    let mut backend = MemoryBackend::new();
    backend.put(Key::new("user/a"));
    let (mut client, handle) = spawn_session(backend);

    let mut payload = Vec::new();
    wire::write_key(&mut payload, &Key::new("user/a")).unwrap();
    let reply = send_request(&mut client, Procedure::GetKey, payload);
    assert_eq!(reply.reply_status().unwrap(), status::OK);

    let mut body = reply.reply_body();
    let found = wire::read_key(&mut body).unwrap();
    assert_eq!(found.name().canonical(), "user/a");

    send_request(&mut client, Procedure::Close, Vec::new());
    drop(client);
    handle.join().unwrap();
}

#[test]
fn get_key_miss_returns_enoent_and_keeps_session_open() {
    let backend = MemoryBackend::new();
    let (mut client, handle) = spawn_session(backend);

    let mut payload = Vec::new();
    wire::write_key(&mut payload, &Key::new("user/missing")).unwrap();
    let reply = send_request(&mut client, Procedure::GetKey, payload);
    assert_eq!(reply.reply_status().unwrap(), status::ENOENT);

    // session must still be alive: a second, unrelated request still works.
    let mut payload = Vec::new();
    wire::write_key(&mut payload, &Key::new("user/missing")).unwrap();
    let reply = send_request(&mut client, Procedure::GetKey, payload);
    assert_eq!(reply.reply_status().unwrap(), status::ENOENT);

    send_request(&mut client, Procedure::Close, Vec::new());
    drop(client);
    handle.join().unwrap();
}

#[test]
fn get_children_returns_direct_descendants_only() {
    let mut backend = MemoryBackend::new();
    backend.put(Key::new("user/a"));
    backend.put(Key::new("user/a/b"));
    backend.put(Key::new("user/a/b/c"));
    let (mut client, handle) = spawn_session(backend);

    let mut payload = Vec::new();
    wire::write_key(&mut payload, &Key::new("user/a")).unwrap();
    let reply = send_request(&mut client, Procedure::GetChild, payload);
    assert_eq!(reply.reply_status().unwrap(), status::OK);

    let mut body = reply.reply_body();
    let children = wire::read_keyset(&mut body).unwrap();
    let names: std::collections::HashSet<String> =
        children.iter().map(|k| k.name().canonical()).collect();
    assert_eq!(names, hashset! { "user/a/b".to_string() });

    send_request(&mut client, Procedure::Close, Vec::new());
    drop(client);
    handle.join().unwrap();
}

#[test]
fn reserved_procedure_replies_not_implemented() {
    let backend = MemoryBackend::new();
    let (mut client, handle) = spawn_session(backend);

    let reply = send_request(&mut client, Procedure::SetKey, Vec::new());
    assert_eq!(reply.reply_status().unwrap(), status::ENOSYS);

    send_request(&mut client, Procedure::Close, Vec::new());
    drop(client);
    handle.join().unwrap();
}

#[test]
fn malformed_request_gets_ebadmsg_but_connection_stays_open() {
    let backend = MemoryBackend::new();
    let (mut client, handle) = spawn_session(backend);

    // A reply sent where the server expects a request: wrong message type.
    let bogus = Message::reply(Procedure::GetKey, status::OK, &[]);
    bogus.write(&mut client).unwrap();
    let reply = Message::read(&mut client).unwrap();
    assert_eq!(reply.reply_status().unwrap(), status::EBADMSG);

    // Connection survives: a well-formed request still gets served.
    let reply = send_request(&mut client, Procedure::SetKey, Vec::new());
    assert_eq!(reply.reply_status().unwrap(), status::ENOSYS);

    send_request(&mut client, Procedure::Close, Vec::new());
    drop(client);
    handle.join().unwrap();
}

#[test]
fn close_terminates_the_session() {
    let backend = MemoryBackend::new();
    let (mut client, handle) = spawn_session(backend);

    let reply = send_request(&mut client, Procedure::Close, Vec::new());
    assert_eq!(reply.reply_status().unwrap(), status::OK);

    drop(client);
    handle.join().unwrap();
}
