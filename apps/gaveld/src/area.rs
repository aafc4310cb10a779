//! Area state. One mutex per area covers every field; all methods take it
//! internally, and callers that need a compound transaction use [`Area::lock`].
//! Nothing here performs I/O, so the mutex is never held across a write.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;

use crate::config::AreaConfig;
use crate::testimony::Testimony;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceMode {
    Any,
    Cms,
    Mods,
}

impl EvidenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceMode::Any => "any",
            EvidenceMode::Cms => "cms",
            EvidenceMode::Mods => "mods",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Free,
    Spectatable,
    Locked,
}

impl LockState {
    pub fn arup_str(self) -> &'static str {
        match self {
            LockState::Free => "FREE",
            LockState::Spectatable => "SPECTATABLE",
            LockState::Locked => "LOCKED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    LookingForPlayers,
    Casing,
    Recess,
    Rp,
    Gaming,
}

impl Status {
    pub fn arup_str(self) -> &'static str {
        match self {
            Status::Idle => "IDLE",
            Status::LookingForPlayers => "LOOKING-FOR-PLAYERS",
            Status::Casing => "CASING",
            Status::Recess => "RECESS",
            Status::Rp => "RP",
            Status::Gaming => "GAMING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Some(Status::Idle),
            "looking-for-players" => Some(Status::LookingForPlayers),
            "casing" => Some(Status::Casing),
            "recess" => Some(Status::Recess),
            "rp" => Some(Status::Rp),
            "gaming" => Some(Status::Gaming),
            _ => None,
        }
    }
}

/// Everything behind the area mutex.
#[derive(Debug)]
pub struct AreaState {
    pub background: String,
    pub evi_mode: EvidenceMode,
    pub allow_iniswap: bool,
    pub force_nointerrupt: bool,
    pub allow_cms: bool,
    pub force_bglist: bool,
    pub lock_bg: bool,
    pub lock_music: bool,
    pub doc: String,

    pub taken: Vec<bool>,
    pub players: i32,
    pub def_hp: i32,
    pub pro_hp: i32,
    pub evidence: Vec<String>,
    pub buffer: VecDeque<String>,
    pub cms: Vec<i32>,
    pub invited: Vec<i32>,
    pub last_speaker: i32,
    pub lock: LockState,
    pub status: Status,
    pub testimony: Testimony,
}

impl AreaState {
    fn fresh(defaults: &AreaConfig, char_len: usize) -> Self {
        Self {
            background: defaults.background.clone(),
            evi_mode: defaults.evidence_mode,
            allow_iniswap: defaults.allow_iniswap,
            force_nointerrupt: defaults.force_nointerrupt,
            allow_cms: defaults.allow_cms,
            force_bglist: defaults.force_bglist,
            lock_bg: defaults.lock_bg,
            lock_music: defaults.lock_music,
            doc: String::new(),
            taken: vec![false; char_len],
            players: 0,
            def_hp: 10,
            pro_hp: 10,
            evidence: Vec::new(),
            buffer: VecDeque::new(),
            cms: Vec::new(),
            invited: Vec::new(),
            last_speaker: -1,
            lock: LockState::Free,
            status: Status::Idle,
            testimony: Testimony::default(),
        }
    }
}

#[derive(Debug)]
pub struct Area {
    defaults: AreaConfig,
    char_len: usize,
    buf_len: usize,
    state: Mutex<AreaState>,
}

impl Area {
    pub fn new(defaults: AreaConfig, char_len: usize, buf_len: usize) -> Self {
        let state = Mutex::new(AreaState::fresh(&defaults, char_len));
        Self {
            defaults,
            char_len,
            buf_len,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.defaults.name
    }

    /// Borrow the whole state for a compound transaction. Never hold the
    /// guard across an await point.
    pub fn lock(&self) -> MutexGuard<'_, AreaState> {
        self.state.lock().expect("area mutex poisoned")
    }

    /// Restore the defaults captured at construction. The audit buffer is
    /// deliberately kept: reports must survive an empty room.
    pub fn reset(&self) {
        let mut st = self.lock();
        let buffer = std::mem::take(&mut st.buffer);
        *st = AreaState::fresh(&self.defaults, self.char_len);
        st.buffer = buffer;
    }

    // Seats.

    /// Add a player using character `c` (`-1` for a spectator). Fails when
    /// the seat is taken.
    pub fn add_char(&self, c: i32) -> bool {
        let mut st = self.lock();
        if c != -1 {
            let Some(seat) = st.taken.get_mut(c as usize).filter(|t| !**t) else {
                return false;
            };
            *seat = true;
        }
        st.players += 1;
        true
    }

    /// Atomically trade seat `old` for seat `new`. Fails when `new` is taken.
    pub fn switch_char(&self, old: i32, new: i32) -> bool {
        let mut st = self.lock();
        if new != -1 {
            match st.taken.get(new as usize) {
                Some(false) => {}
                _ => return false,
            }
            st.taken[new as usize] = true;
        }
        if old != -1 {
            if let Some(seat) = st.taken.get_mut(old as usize) {
                *seat = false;
            }
        }
        true
    }

    pub fn remove_char(&self, c: i32) {
        let mut st = self.lock();
        if c != -1 {
            if let Some(seat) = st.taken.get_mut(c as usize) {
                *seat = false;
            }
        }
        st.players -= 1;
    }

    /// Taken list in `CharsCheck` form: `-1` taken, `0` free.
    pub fn taken_list(&self) -> Vec<String> {
        self.lock()
            .taken
            .iter()
            .map(|t| if *t { "-1" } else { "0" }.to_string())
            .collect()
    }

    pub fn player_count(&self) -> i32 {
        self.lock().players
    }

    // Penalty bars.

    pub fn hp(&self) -> (i32, i32) {
        let st = self.lock();
        (st.def_hp, st.pro_hp)
    }

    /// Bar 1 is the defense, bar 2 the prosecution; values clamp to nothing,
    /// out-of-range input is refused.
    pub fn set_hp(&self, bar: i32, v: i32) -> bool {
        if !(0..=10).contains(&v) {
            return false;
        }
        let mut st = self.lock();
        match bar {
            1 => st.def_hp = v,
            2 => st.pro_hp = v,
            _ => return false,
        }
        true
    }

    // Evidence.

    pub fn evidence(&self) -> Vec<String> {
        self.lock().evidence.clone()
    }

    pub fn evidence_len(&self) -> usize {
        self.lock().evidence.len()
    }

    pub fn add_evidence(&self, evi: String) {
        self.lock().evidence.push(evi);
    }

    pub fn remove_evidence(&self, id: usize) -> bool {
        let mut st = self.lock();
        if id >= st.evidence.len() {
            return false;
        }
        st.evidence.remove(id);
        true
    }

    pub fn edit_evidence(&self, id: usize, evi: String) -> bool {
        let mut st = self.lock();
        let Some(slot) = st.evidence.get_mut(id) else {
            return false;
        };
        *slot = evi;
        true
    }

    pub fn swap_evidence(&self, a: usize, b: usize) -> bool {
        let mut st = self.lock();
        if a >= st.evidence.len() || b >= st.evidence.len() {
            return false;
        }
        st.evidence.swap(a, b);
        true
    }

    // Case managers and invites.

    pub fn add_cm(&self, uid: i32) -> bool {
        let mut st = self.lock();
        if st.cms.contains(&uid) {
            return false;
        }
        st.cms.push(uid);
        true
    }

    pub fn remove_cm(&self, uid: i32) -> bool {
        let mut st = self.lock();
        let before = st.cms.len();
        st.cms.retain(|u| *u != uid);
        st.cms.len() != before
    }

    pub fn has_cm(&self, uid: i32) -> bool {
        self.lock().cms.contains(&uid)
    }

    pub fn cms(&self) -> Vec<i32> {
        self.lock().cms.clone()
    }

    pub fn add_invited(&self, uid: i32) -> bool {
        let mut st = self.lock();
        if st.invited.contains(&uid) {
            return false;
        }
        st.invited.push(uid);
        true
    }

    pub fn remove_invited(&self, uid: i32) -> bool {
        let mut st = self.lock();
        let before = st.invited.len();
        st.invited.retain(|u| *u != uid);
        st.invited.len() != before
    }

    pub fn clear_invited(&self) {
        self.lock().invited.clear();
    }

    pub fn is_invited(&self, uid: i32) -> bool {
        self.lock().invited.contains(&uid)
    }

    // Lock, status, doc, last speaker.

    pub fn lock_state(&self) -> LockState {
        self.lock().lock
    }

    pub fn set_lock(&self, l: LockState) {
        self.lock().lock = l;
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn set_status(&self, s: Status) {
        self.lock().status = s;
    }

    pub fn doc(&self) -> String {
        self.lock().doc.clone()
    }

    pub fn set_doc(&self, doc: String) {
        self.lock().doc = doc;
    }

    pub fn last_speaker(&self) -> i32 {
        self.lock().last_speaker
    }

    pub fn set_last_speaker(&self, c: i32) {
        self.lock().last_speaker = c;
    }

    // Policy overrides.

    pub fn background(&self) -> String {
        self.lock().background.clone()
    }

    pub fn set_background(&self, bg: String) {
        self.lock().background = bg;
    }

    pub fn evi_mode(&self) -> EvidenceMode {
        self.lock().evi_mode
    }

    pub fn set_evi_mode(&self, m: EvidenceMode) {
        self.lock().evi_mode = m;
    }

    pub fn iniswap_allowed(&self) -> bool {
        self.lock().allow_iniswap
    }

    pub fn set_iniswap_allowed(&self, v: bool) {
        self.lock().allow_iniswap = v;
    }

    pub fn no_interrupt(&self) -> bool {
        self.lock().force_nointerrupt
    }

    pub fn set_no_interrupt(&self, v: bool) {
        self.lock().force_nointerrupt = v;
    }

    pub fn cms_allowed(&self) -> bool {
        self.lock().allow_cms
    }

    pub fn set_cms_allowed(&self, v: bool) {
        self.lock().allow_cms = v;
    }

    pub fn force_bglist(&self) -> bool {
        self.lock().force_bglist
    }

    pub fn set_force_bglist(&self, v: bool) {
        self.lock().force_bglist = v;
    }

    pub fn lock_bg(&self) -> bool {
        self.lock().lock_bg
    }

    pub fn set_lock_bg(&self, v: bool) {
        self.lock().lock_bg = v;
    }

    pub fn lock_music(&self) -> bool {
        self.lock().lock_music
    }

    pub fn set_lock_music(&self, v: bool) {
        self.lock().lock_music = v;
    }

    // Audit buffer.

    pub fn push_buffer(&self, line: String) {
        let mut st = self.lock();
        if self.buf_len > 0 && st.buffer.len() >= self.buf_len {
            st.buffer.pop_front();
        }
        st.buffer.push_back(line);
    }

    pub fn buffer(&self) -> Vec<String> {
        self.lock().buffer.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> Area {
        Area::new(AreaConfig::default(), 50, 150)
    }

    #[test]
    fn join_takes_seats_and_counts_spectators() {
        let a = area();

        assert!(a.add_char(0));
        assert_eq!(a.player_count(), 1);

        assert!(a.add_char(1));
        assert_eq!(a.player_count(), 2);

        // Seat 0 is taken; a third join with it fails without a count change.
        assert!(!a.add_char(0));
        assert_eq!(a.player_count(), 2);

        a.remove_char(0);
        assert!(a.add_char(0));

        assert!(a.add_char(-1));
        assert_eq!(a.player_count(), 3);
    }

    #[test]
    fn switch_respects_taken_seats() {
        let a = area();

        a.add_char(0);
        assert!(a.switch_char(0, 1));
        assert!(!a.add_char(1));

        assert!(a.add_char(0));
        assert!(!a.switch_char(0, 1));

        a.add_char(-1);
        assert!(!a.switch_char(-1, 0));
        // Dropping to spectator always works.
        assert!(a.switch_char(1, -1));
        assert!(a.add_char(1));
    }

    #[test]
    fn seat_is_taken_by_at_most_one_player() {
        let a = area();
        assert!(a.add_char(3));
        assert!(!a.add_char(3));
        assert!(!a.switch_char(-1, 3));
        a.remove_char(3);
        assert!(a.switch_char(-1, 3));
    }

    #[test]
    fn evidence_shape() {
        let a = area();
        let (evi1, evi2) = ("foo&foo&foo", "bar&bar&bar");

        a.add_evidence(evi1.to_string());
        a.add_evidence(evi2.to_string());
        assert_eq!(a.evidence_len(), 2);

        assert!(a.swap_evidence(0, 1));
        assert_eq!(a.evidence(), vec![evi2.to_string(), evi1.to_string()]);

        let evi3 = "foobar&foobar&foobar";
        assert!(a.edit_evidence(0, evi3.to_string()));
        assert_eq!(a.evidence()[0], evi3);

        assert!(a.remove_evidence(0));
        assert_eq!(a.evidence(), vec![evi1.to_string()]);

        // Out-of-range operations are no-ops.
        assert!(!a.remove_evidence(1));
        assert!(!a.edit_evidence(5, "x".to_string()));
        assert!(!a.swap_evidence(0, 1));
        assert_eq!(a.evidence(), vec![evi1.to_string()]);
    }

    #[test]
    fn hp_bounds() {
        let a = area();
        assert_eq!(a.hp(), (10, 10));
        assert!(a.set_hp(1, 0));
        assert!(a.set_hp(2, 10));
        assert!(!a.set_hp(1, 11));
        assert!(!a.set_hp(1, -1));
        assert!(!a.set_hp(3, 5));
        assert_eq!(a.hp(), (0, 10));
    }

    #[test]
    fn cm_set_semantics() {
        let a = area();
        assert!(a.add_cm(0));
        assert!(a.has_cm(0));
        assert!(!a.add_cm(0));
        assert!(a.remove_cm(0));
        assert!(!a.has_cm(0));
        assert!(!a.remove_cm(0));
    }

    #[test]
    fn invite_set_semantics() {
        let a = area();
        assert!(a.add_invited(1));
        assert!(!a.add_invited(1));
        assert!(a.is_invited(1));
        assert!(a.remove_invited(1));
        assert!(!a.is_invited(1));
        assert!(!a.remove_invited(1));
    }

    #[test]
    fn buffer_is_a_bounded_ring() {
        let a = Area::new(AreaConfig::default(), 5, 3);
        for i in 0..5 {
            a.push_buffer(format!("line {i}"));
        }
        assert_eq!(a.buffer(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn reset_restores_construction_defaults() {
        let defaults = AreaConfig {
            name: "B".to_string(),
            background: "courtroom".to_string(),
            evidence_mode: EvidenceMode::Cms,
            allow_iniswap: false,
            ..AreaConfig::default()
        };
        let a = Area::new(defaults, 10, 10);

        a.set_background("beach".to_string());
        a.set_iniswap_allowed(true);
        a.set_evi_mode(EvidenceMode::Any);
        a.set_lock(LockState::Locked);
        a.set_status(Status::Casing);
        a.set_doc("http://example.com".to_string());
        a.add_cm(7);
        a.add_invited(7);
        a.add_evidence("e1".to_string());
        a.set_hp(1, 3);
        a.set_last_speaker(4);
        a.push_buffer("IC something".to_string());
        {
            let mut st = a.lock();
            st.testimony.append("title");
        }

        a.reset();

        assert_eq!(a.background(), "courtroom");
        assert_eq!(a.evi_mode(), EvidenceMode::Cms);
        assert!(!a.iniswap_allowed());
        assert_eq!(a.lock_state(), LockState::Free);
        assert_eq!(a.status(), Status::Idle);
        assert_eq!(a.doc(), "");
        assert!(a.cms().is_empty());
        assert!(!a.is_invited(7));
        assert!(a.evidence().is_empty());
        assert_eq!(a.hp(), (10, 10));
        assert_eq!(a.last_speaker(), -1);
        assert!(a.lock().testimony.is_empty());
        // The audit trail survives a reset.
        assert_eq!(a.buffer().len(), 1);
    }
}
