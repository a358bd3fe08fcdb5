//! Per-connection request handling: one thread per connection, no shared
//! mutable state between sessions, matching the concurrency model in the
//! core library's design (refcount operations aside, nothing here needs
//! cross-session synchronisation because nothing is shared).

use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use keystore::backend::Backend;
use keystore::wire;

use crate::error::{self, Result};
use crate::protocol::{status, Message, MessageType, Procedure};

/// The session's lifecycle, spelled out so logging and tests can assert on
/// the current phase instead of inferring it from control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticating,
    Ready,
    Handling,
    Closing,
    Closed,
}

/// The effective credentials of the connected peer, resolved once at
/// session start via the transport's out-of-band mechanism (a Unix
/// domain socket's peer-credentials query).
#[derive(Debug, Clone, Copy)]
pub struct PeerCredentials {
    pub uid: u32,
    pub gid: u32,
}

fn resolve_peer_credentials<S: AsRawFd>(stream: &S) -> Result<PeerCredentials> {
    // `getpeereid` takes a bare `RawFd`, not a generic `AsRawFd` reference.
    let (uid, gid) = nix::unistd::getpeereid(stream.as_raw_fd())
        .map_err(|source| error::Error::PeerCredentials { source })?;
    Ok(PeerCredentials {
        uid: uid.as_raw(),
        gid: gid.as_raw(),
    })
}

/// Run one connection to completion: resolve peer credentials, then loop
/// reading a request, dispatching to `backend`, and writing a reply, until
/// a `CLOSE` is processed or a read fails.
///
/// A read/parse failure while `Ready`/`Handling` drops the connection
/// without a reply (a fatal transition straight to `Closed`); a malformed
/// request that was at least framed correctly gets an `EBADMSG` reply and
/// the session stays open.
pub fn run<T, B>(transport: &mut T, backend: &mut B) -> Result<()>
where
    T: Read + Write + AsRawFd,
    B: Backend,
{
    let mut state = SessionState::Authenticating;

    let credentials = match resolve_peer_credentials(transport) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("failed to resolve peer credentials: {}", e);
            return Err(e);
        }
    };
    log::debug!(
        "session authenticated for uid={} gid={}",
        credentials.uid,
        credentials.gid
    );
    state = SessionState::Ready;

    loop {
        let request = match Message::read(transport) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("session closed on read error: {}", e);
                state = SessionState::Closed;
                return Err(error::Error::KeyStore { source: e });
            }
        };
        state = SessionState::Handling;

        if request.msg_type != MessageType::Request {
            log::warn!("dropping non-request message from peer");
            let reply = Message::reply(request.procedure, status::EBADMSG, &[]);
            reply.write(transport).map_err(wrap_keystore)?;
            state = SessionState::Ready;
            continue;
        }

        log::debug!("dispatching procedure {:?}", request.procedure);

        if request.procedure == Procedure::Close {
            let reply = Message::reply(Procedure::Close, status::OK, &[]);
            reply.write(transport).map_err(wrap_keystore)?;
            state = SessionState::Closing;
            break;
        }

        let reply = dispatch(&request, backend);
        reply.write(transport).map_err(wrap_keystore)?;
        state = SessionState::Ready;
    }

    state = SessionState::Closed;
    log::debug!("session {:?}", state);
    Ok(())
}

fn wrap_keystore(source: keystore::Error) -> error::Error {
    error::Error::KeyStore { source }
}

fn dispatch<B: Backend>(request: &Message, backend: &mut B) -> Message {
    match request.procedure {
        Procedure::Open => match backend.open() {
            Ok(()) => Message::reply(Procedure::Open, status::OK, &[]),
            Err(_) => Message::reply(Procedure::Open, status::EBADMSG, &[]),
        },
        Procedure::GetKey => {
            let mut cursor = &request.payload[..];
            let name_key = match wire::read_key(&mut cursor) {
                Ok(k) => k,
                Err(_) => return Message::reply(Procedure::GetKey, status::EBADMSG, &[]),
            };
            match backend.get_key(&name_key) {
                Ok(found) => {
                    let mut body = Vec::new();
                    if wire::write_key(&mut body, &found).is_err() {
                        return Message::reply(Procedure::GetKey, status::EBADMSG, &[]);
                    }
                    Message::reply(Procedure::GetKey, status::OK, &body)
                }
                Err(_) => Message::reply(Procedure::GetKey, status::ENOENT, &[]),
            }
        }
        Procedure::GetChild => {
            let mut cursor = &request.payload[..];
            let parent = match wire::read_key(&mut cursor) {
                Ok(k) => k,
                Err(_) => return Message::reply(Procedure::GetChild, status::EBADMSG, &[]),
            };
            match backend.get_children(&parent) {
                Ok(children) => {
                    let mut body = Vec::new();
                    if wire::write_keyset(&mut body, &children).is_err() {
                        return Message::reply(Procedure::GetChild, status::EBADMSG, &[]);
                    }
                    Message::reply(Procedure::GetChild, status::OK, &body)
                }
                Err(_) => Message::reply(Procedure::GetChild, status::EBADMSG, &[]),
            }
        }
        Procedure::Close => unreachable!("CLOSE is handled by the caller before dispatch"),
        other => {
            log::debug!("procedure {:?} is reserved, not implemented", other);
            Message::reply(other, status::ENOSYS, &[])
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use keystore::key::Key;
    use keystore::memory::MemoryBackend;

    #[test]
    fn dispatch_get_key_hit_and_miss() {
        let mut backend = MemoryBackend::new();
        backend.put(Key::new("user/a"));

        let mut payload = Vec::new();
        wire::write_key(&mut payload, &Key::new("user/a")).unwrap();
        let request = Message::request(Procedure::GetKey, payload);
        let reply = dispatch(&request, &mut backend);
        assert_eq!(reply.reply_status().unwrap(), status::OK);

        let mut payload = Vec::new();
        wire::write_key(&mut payload, &Key::new("user/missing")).unwrap();
        let request = Message::request(Procedure::GetKey, payload);
        let reply = dispatch(&request, &mut backend);
        assert_eq!(reply.reply_status().unwrap(), status::ENOENT);
    }

    #[test]
    fn dispatch_reserved_procedure_is_not_implemented() {
        let mut backend = MemoryBackend::new();
        let request = Message::request(Procedure::SetKey, Vec::new());
        let reply = dispatch(&request, &mut backend);
        assert_eq!(reply.reply_status().unwrap(), status::ENOSYS);
    }
}
