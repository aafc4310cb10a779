//! Per-connection state and the client handle shared between the read loop,
//! broadcast plane and command handlers.

use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use md5::Digest;
use md5::Md5;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use aopacket::Packet;

use crate::area::Area;
use crate::permissions;

/// What a mute covers. A parrot may still "speak": their words are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mute {
    #[default]
    Unmuted,
    Ic,
    Ooc,
    IcOoc,
    Music,
    Judge,
    Parrot,
}

impl Mute {
    pub fn as_str(self) -> &'static str {
        match self {
            Mute::Unmuted => "nothing",
            Mute::Ic => "IC",
            Mute::Ooc => "OOC",
            Mute::IcOoc => "IC and OOC",
            Mute::Music => "changing music",
            Mute::Judge => "judge controls",
            Mute::Parrot => "speaking like a person",
        }
    }
}

/// Stored pairing info, adopted by a partner's IC message.
#[derive(Debug, Clone, Default)]
pub struct PairInfo {
    pub name: String,
    pub emote: String,
    pub flip: String,
    pub offset: String,
    /// Character id this client wants to pair with.
    pub wanted: i32,
}

#[derive(Debug, Default)]
pub struct ClientState {
    pub uid: i32,
    pub hdid: String,
    pub area: usize,
    pub char_id: i32,
    pub pos: String,
    pub ooc_name: String,
    pub showname: String,
    pub last_msg: String,
    pub perms: u64,
    pub authenticated: bool,
    pub mod_name: String,
    pub muted: Mute,
    pub mute_until: Option<Instant>,
    pub pair: PairInfo,
    /// Case-alert opt-ins: defense, prosecution, judge, jury, stenographer.
    pub case_alerts: [bool; 5],
    pub joining: bool,
    pub narrator: bool,
}

#[derive(Debug)]
pub struct Client {
    /// Stable per-process connection number, for logs only.
    pub conn_id: u64,
    pub ipid: String,
    outbox: mpsc::Sender<Bytes>,
    shutdown: Notify,
    state: Mutex<ClientState>,
}

impl Client {
    pub fn new(conn_id: u64, ip: IpAddr, outbox: mpsc::Sender<Bytes>) -> Self {
        Self {
            conn_id,
            ipid: hashed_id(ip.to_string().as_bytes()),
            outbox,
            shutdown: Notify::new(),
            state: Mutex::new(ClientState {
                uid: -1,
                char_id: -1,
                pair: PairInfo {
                    wanted: -1,
                    ..PairInfo::default()
                },
                ..ClientState::default()
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().expect("client mutex poisoned")
    }

    // Write path. The outbox is drained by a single writer task per
    // connection, so bytes from different senders never interleave.

    pub fn write_raw(&self, data: String) {
        let _ = self.outbox.try_send(Bytes::from(data));
    }

    pub fn send_packet(&self, header: &str, body: &[&str]) {
        let p = Packet::new(header, body.iter().map(|s| s.to_string()).collect());
        self.write_raw(p.to_string());
    }

    /// A server OOC line, the reply channel for policy denials.
    pub fn send_server_message(&self, server_name: &str, msg: &str) {
        self.send_packet("CT", &[&aopacket::encode(server_name), msg, "1"]);
    }

    /// Ask the session task to tear the connection down.
    pub fn disconnect(&self) {
        self.shutdown.notify_one();
    }

    pub async fn closed(&self) {
        self.shutdown.notified().await;
    }

    // Snapshot accessors for the hot fields.

    pub fn uid(&self) -> i32 {
        self.lock().uid
    }

    pub fn hdid(&self) -> String {
        self.lock().hdid.clone()
    }

    pub fn area_index(&self) -> usize {
        self.lock().area
    }

    pub fn char_id(&self) -> i32 {
        self.lock().char_id
    }

    pub fn perms(&self) -> u64 {
        self.lock().perms
    }

    pub fn ooc_name(&self) -> String {
        self.lock().ooc_name.clone()
    }

    pub fn mod_name(&self) -> String {
        self.lock().mod_name.clone()
    }

    pub fn authenticated(&self) -> bool {
        self.lock().authenticated
    }

    /// Current mute kind, clearing it first if the timer has lapsed.
    pub fn checked_mute(&self) -> Mute {
        let mut st = self.lock();
        if let Some(until) = st.mute_until {
            if Instant::now() >= until && st.muted != Mute::Unmuted {
                st.muted = Mute::Unmuted;
                st.mute_until = None;
            }
        }
        st.muted
    }

    pub fn set_mute(&self, m: Mute, until: Option<Instant>) {
        let mut st = self.lock();
        st.muted = m;
        st.mute_until = until;
    }

    /// Drop moderator status; the client must re-authenticate to get it back.
    pub fn remove_auth(&self) {
        let mut st = self.lock();
        st.authenticated = false;
        st.perms = 0;
        st.mod_name.clear();
        drop(st);
        self.send_packet("AUTH", &["0"]);
    }

    // Policy gates consulted by handlers. All of these take the client's own
    // lock briefly; none touch sockets.

    pub fn has_permission(&self, required: u64) -> bool {
        permissions::has_permission(self.perms(), required)
    }

    /// CM of the current area, or holder of the CM permission bit.
    pub fn has_cm_permission(&self, area: &Area) -> bool {
        self.has_permission(permissions::CM) || area.has_cm(self.uid())
    }

    pub fn can_speak(&self, area: &Area) -> bool {
        if matches!(self.checked_mute(), Mute::Ic | Mute::IcOoc) {
            return false;
        }
        if area.lock_state() == crate::area::LockState::Spectatable
            && !area.is_invited(self.uid())
            && !self.has_permission(permissions::BYPASS_LOCK)
        {
            return false;
        }
        true
    }

    pub fn can_speak_ooc(&self) -> bool {
        !matches!(self.checked_mute(), Mute::Ooc | Mute::IcOoc)
    }

    pub fn can_change_music(&self, area: &Area) -> bool {
        if self.checked_mute() == Mute::Music {
            return false;
        }
        !area.lock_music() || self.has_cm_permission(area)
    }

    pub fn can_judge(&self) -> bool {
        self.checked_mute() != Mute::Judge
    }

    pub fn can_alter_evidence(&self, area: &Area) -> bool {
        match area.evi_mode() {
            crate::area::EvidenceMode::Any => true,
            crate::area::EvidenceMode::Cms => {
                self.has_cm_permission(area) || self.has_permission(permissions::MOD_EVI)
            }
            crate::area::EvidenceMode::Mods => self.has_permission(permissions::MOD_EVI),
        }
    }
}

/// Identifier derivation: `base64(md5(input))` with the two trailing padding
/// characters stripped, leaving 22 chars.
pub fn hashed_id(input: &[u8]) -> String {
    let digest = Md5::digest(input);
    let mut s = BASE64.encode(digest);
    s.truncate(s.len().saturating_sub(2));
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_id_is_22_chars_without_padding() {
        let id = hashed_id(b"127.0.0.1");
        assert_eq!(id.len(), 22);
        assert!(!id.ends_with('='));
        // Stable for the session: same input, same id.
        assert_eq!(id, hashed_id(b"127.0.0.1"));
        assert_ne!(id, hashed_id(b"127.0.0.2"));
    }

    #[test]
    fn mute_expires() {
        let (tx, _rx) = mpsc::channel(8);
        let c = Client::new(0, "127.0.0.1".parse().unwrap(), tx);
        c.set_mute(Mute::Ic, Some(Instant::now() - std::time::Duration::from_secs(1)));
        assert_eq!(c.checked_mute(), Mute::Unmuted);

        c.set_mute(Mute::Ooc, None);
        assert_eq!(c.checked_mute(), Mute::Ooc);
    }
}
