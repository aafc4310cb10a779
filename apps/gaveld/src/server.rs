//! Server-wide shared state and the broadcast plane.
//!
//! Locking discipline: registry and area mutexes are only ever held long
//! enough to snapshot or mutate; every socket write happens after the locks
//! are released, through each client's outbox.

use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::info;

use crate::area::Area;
use crate::area::LockState;
use crate::client::Client;
use crate::config::MasterConfig;
use crate::config::ServerConfig;
use crate::db::Store;
use crate::permissions;
use crate::permissions::Role;
use crate::reportlog::ReportLog;
use crate::uid::UidAllocator;
use crate::webhook::Webhook;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BRAND: &str = "gavel";

pub struct Server {
    pub config: ServerConfig,
    pub master: MasterConfig,
    pub characters: Vec<String>,
    pub music: Vec<String>,
    pub backgrounds: Vec<String>,
    pub parrot_lines: Vec<String>,
    pub roles: Vec<Role>,
    pub areas: Vec<Area>,
    /// `#`-joined area names, as the `SM` packet wants them.
    pub area_names: String,
    pub db: Store,
    pub uids: UidAllocator,
    pub reports: ReportLog,
    pub webhook: Option<Webhook>,

    clients: Mutex<Vec<Arc<Client>>>,
    players: AtomicI32,
    next_conn_id: AtomicU64,
    advert_tx: Mutex<Option<mpsc::Sender<i32>>>,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ServerConfig,
        master: MasterConfig,
        characters: Vec<String>,
        music: Vec<String>,
        backgrounds: Vec<String>,
        parrot_lines: Vec<String>,
        roles: Vec<Role>,
        areas: Vec<Area>,
        db: Store,
        reports: ReportLog,
    ) -> Arc<Self> {
        let area_names = areas
            .iter()
            .map(Area::name)
            .collect::<Vec<_>>()
            .join("#");
        let webhook = if config.webhook_url.is_empty() {
            None
        } else {
            Some(Webhook::new(config.webhook_url.clone(), config.name.clone()))
        };
        let uids = UidAllocator::new(config.max_players);
        Arc::new(Self {
            config,
            master,
            characters,
            music,
            backgrounds,
            parrot_lines,
            roles,
            areas,
            area_names,
            db,
            uids,
            reports,
            webhook,
            clients: Mutex::new(Vec::new()),
            players: AtomicI32::new(0),
            next_conn_id: AtomicU64::new(0),
            advert_tx: Mutex::new(None),
        })
    }

    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn set_advertiser(&self, tx: mpsc::Sender<i32>) {
        *self.advert_tx.lock().expect("advert lock poisoned") = Some(tx);
    }

    // Registry.

    pub fn register_client(&self, c: Arc<Client>) {
        self.clients.lock().expect("client list poisoned").push(c);
    }

    pub fn deregister_client(&self, c: &Arc<Client>) {
        self.clients
            .lock()
            .expect("client list poisoned")
            .retain(|other| !Arc::ptr_eq(other, c));
    }

    /// Copy the registry before acting on it; never write while holding it.
    pub fn clients_snapshot(&self) -> Vec<Arc<Client>> {
        self.clients.lock().expect("client list poisoned").clone()
    }

    pub fn client_by_uid(&self, uid: i32) -> Option<Arc<Client>> {
        if uid < 0 {
            return None;
        }
        self.clients_snapshot()
            .into_iter()
            .find(|c| c.uid() == uid)
    }

    pub fn clients_by_ipid(&self, ipid: &str) -> Vec<Arc<Client>> {
        self.clients_snapshot()
            .into_iter()
            .filter(|c| c.ipid == ipid)
            .collect()
    }

    pub fn ipid_session_count(&self, ipid: &str) -> usize {
        self.clients
            .lock()
            .expect("client list poisoned")
            .iter()
            .filter(|c| c.ipid == ipid)
            .count()
    }

    // Player count.

    pub fn player_count(&self) -> i32 {
        self.players.load(Ordering::SeqCst)
    }

    pub fn add_player(&self) {
        let n = self.players.fetch_add(1, Ordering::SeqCst) + 1;
        self.notify_advertiser(n);
    }

    pub fn remove_player(&self) {
        let n = self.players.fetch_sub(1, Ordering::SeqCst) - 1;
        self.notify_advertiser(n);
    }

    fn notify_advertiser(&self, players: i32) {
        let tx = self.advert_tx.lock().expect("advert lock poisoned").clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(players);
        }
    }

    // Fan-out. Each helper snapshots the registry, releases the lock, then
    // queues bytes on the chosen outboxes.

    pub fn write_to_all(&self, header: &str, body: &[&str]) {
        for c in self.clients_snapshot() {
            c.send_packet(header, body);
        }
    }

    pub fn write_to_area(&self, area: usize, header: &str, body: &[&str]) {
        for c in self.clients_snapshot() {
            if c.uid() != -1 && c.area_index() == area {
                c.send_packet(header, body);
            }
        }
    }

    pub fn write_raw_to_area(&self, area: usize, data: &str) {
        for c in self.clients_snapshot() {
            if c.uid() != -1 && c.area_index() == area {
                c.write_raw(data.to_string());
            }
        }
    }

    /// Server OOC line to everyone in an area.
    pub fn send_area_server_message(&self, area: usize, msg: &str) {
        for c in self.clients_snapshot() {
            if c.uid() != -1 && c.area_index() == area {
                c.send_server_message(&self.config.name, msg);
            }
        }
    }

    pub fn server_message(&self, c: &Client, msg: &str) {
        c.send_server_message(&self.config.name, msg);
    }

    // ARUP updates: derived state, always emitted by these helpers after the
    // mutation rather than inline per field.

    pub fn send_player_arup(&self) {
        let mut body = vec!["0".to_string()];
        body.extend(self.areas.iter().map(|a| a.player_count().to_string()));
        let refs: Vec<&str> = body.iter().map(String::as_str).collect();
        self.write_to_all("ARUP", &refs);
    }

    pub fn send_status_arup(&self) {
        let mut body = vec!["1".to_string()];
        body.extend(self.areas.iter().map(|a| a.status().arup_str().to_string()));
        let refs: Vec<&str> = body.iter().map(String::as_str).collect();
        self.write_to_all("ARUP", &refs);
    }

    pub fn send_cm_arup(&self) {
        let mut body = vec!["2".to_string()];
        for a in &self.areas {
            let cms = a.cms();
            if cms.is_empty() {
                body.push("FREE".to_string());
            } else {
                body.push(
                    cms.iter()
                        .map(i32::to_string)
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
        }
        let refs: Vec<&str> = body.iter().map(String::as_str).collect();
        self.write_to_all("ARUP", &refs);
    }

    pub fn send_lock_arup(&self) {
        let mut body = vec!["3".to_string()];
        body.extend(self.areas.iter().map(|a| a.lock_state().arup_str().to_string()));
        let refs: Vec<&str> = body.iter().map(String::as_str).collect();
        self.write_to_all("ARUP", &refs);
    }

    pub fn send_all_arups(&self) {
        self.send_player_arup();
        self.send_status_arup();
        self.send_cm_arup();
        self.send_lock_arup();
    }

    // Audit plumbing.

    pub fn current_character(&self, c: &Client) -> String {
        let char_id = c.char_id();
        if char_id == -1 {
            "Spectator".to_string()
        } else {
            self.characters
                .get(char_id as usize)
                .cloned()
                .unwrap_or_else(|| "Spectator".to_string())
        }
    }

    /// Append a line to the client's area buffer; `audit` additionally writes
    /// it to the server-wide audit log.
    pub fn add_to_buffer(&self, c: &Client, kind: &str, msg: &str, audit: bool) {
        let area_idx = c.area_index();
        let Some(area) = self.areas.get(area_idx) else {
            return;
        };
        let line = format!(
            "[{}] [{}] {} (UID {}, IPID {}): {}",
            Utc::now().format("%H:%M:%S"),
            kind,
            self.current_character(c),
            c.uid(),
            c.ipid,
            msg
        );
        if audit {
            self.reports.write_audit(&format!("[{}] {}", area.name(), line));
        }
        area.push_buffer(line);
    }

    // Seat and area transitions.

    /// Switch the client's character in its current area. Broadcasts the new
    /// taken list on success.
    pub fn change_character(&self, c: &Client, new: i32) -> bool {
        let (area_idx, old) = {
            let st = c.lock();
            (st.area, st.char_id)
        };
        let area = &self.areas[area_idx];
        if !area.switch_char(old, new) {
            return false;
        }
        c.lock().char_id = new;
        let taken = area.taken_list();
        let refs: Vec<&str> = taken.iter().map(String::as_str).collect();
        self.write_to_area(area_idx, "CharsCheck", &refs);
        true
    }

    /// Move a client to another area, carrying its character if the seat is
    /// free there. Enforces the target's lock.
    pub fn change_area(&self, c: &Arc<Client>, target_idx: usize) -> Result<(), &'static str> {
        let Some(target) = self.areas.get(target_idx) else {
            return Err("no such area");
        };
        let (old_idx, char_id, uid) = {
            let st = c.lock();
            (st.area, st.char_id, st.uid)
        };
        if old_idx == target_idx {
            return Err("already there");
        }
        if target.lock_state() == LockState::Locked
            && !target.is_invited(uid)
            && !c.has_permission(permissions::BYPASS_LOCK)
        {
            return Err("not invited");
        }

        self.leave_area(old_idx, char_id);

        // Keep the seat if it is free over there, else fall back to spectator.
        let mut new_char = char_id;
        if !target.add_char(new_char) {
            new_char = -1;
            target.add_char(-1);
        }
        {
            let mut st = c.lock();
            st.area = target_idx;
            st.char_id = new_char;
        }

        self.send_area_snapshot(c, target_idx);
        if new_char != char_id {
            // Seat lost: back to character select.
            c.send_packet("DONE", &[]);
        }
        let taken = target.taken_list();
        let refs: Vec<&str> = taken.iter().map(String::as_str).collect();
        self.write_to_area(target_idx, "CharsCheck", &refs);
        self.send_player_arup();
        Ok(())
    }

    /// Remove a seat from an area; the last occupant leaving restores the
    /// area's defaults and republishes the derived state.
    pub fn leave_area(&self, area_idx: usize, char_id: i32) {
        let area = &self.areas[area_idx];
        area.remove_char(char_id);
        if area.player_count() <= 0 {
            area.reset();
            self.send_lock_arup();
            self.send_status_arup();
            self.send_cm_arup();
        } else {
            let taken = area.taken_list();
            let refs: Vec<&str> = taken.iter().map(String::as_str).collect();
            self.write_to_area(area_idx, "CharsCheck", &refs);
        }
    }

    /// Send one client everything it needs to render an area.
    pub fn send_area_snapshot(&self, c: &Client, area_idx: usize) {
        let area = &self.areas[area_idx];
        let evidence = area.evidence();
        let refs: Vec<&str> = evidence.iter().map(String::as_str).collect();
        c.send_packet("LE", &refs);
        let taken = area.taken_list();
        let refs: Vec<&str> = taken.iter().map(String::as_str).collect();
        c.send_packet("CharsCheck", &refs);
        let (def, pro) = area.hp();
        c.send_packet("HP", &["1", &def.to_string()]);
        c.send_packet("HP", &["2", &pro.to_string()]);
        c.send_packet("BN", &[&area.background()]);
    }

    /// Full teardown for a disconnecting client. Idempotence is guaranteed by
    /// the caller running it exactly once, after the read loop has ended.
    pub fn cleanup_client(&self, c: &Arc<Client>) {
        let (uid, area_idx, char_id, was_joined) = {
            let st = c.lock();
            (st.uid, st.area, st.char_id, st.uid != -1)
        };

        if was_joined {
            let area = &self.areas[area_idx];
            let was_cm = area.remove_cm(uid);
            self.leave_area(area_idx, char_id);
            if was_cm && area.player_count() > 0 {
                self.send_cm_arup();
            }
            for a in &self.areas {
                a.remove_invited(uid);
            }
            c.lock().uid = -1;
            self.uids.release(uid);
            self.remove_player();
            self.send_player_arup();
            info!(uid, ipid = %c.ipid, "client left the server");
        }

        self.deregister_client(c);
    }

    pub fn disconnect_all(&self) {
        for c in self.clients_snapshot() {
            c.disconnect();
        }
    }
}
