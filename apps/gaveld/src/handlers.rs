//! The protocol dispatcher: header → handler, with an argument-count gate and
//! a joined-clients-only gate. Unknown headers are dropped without a reply;
//! so is any frame that fails validation. Policy denials answer with a server
//! OOC line and leave the connection up.
//!
//! Protocol reference:
//! https://github.com/AttorneyOnline/docs/blob/master/docs/development/network.md

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::error;
use tracing::info;

use aopacket::decode;
use aopacket::encode;
use aopacket::Packet;

use crate::client::Client;
use crate::client::Mute;
use crate::commands;
use crate::db::BanLookup;
use crate::server::Server;
use crate::server::BRAND;
use crate::server::VERSION;
use crate::session::ban_payload;
use crate::testimony::RecorderState;

/// Feature list advertised in `FL`; exactly what this server implements.
const FEATURES: [&str; 18] = [
    "noencryption",
    "yellowtext",
    "prezoom",
    "flipping",
    "customobjections",
    "fastloading",
    "deskmod",
    "evidence",
    "cccc_ic_support",
    "arup",
    "casing_alerts",
    "modcall_reason",
    "looping_sfx",
    "additive",
    "effects",
    "y_offset",
    "expanded_desk_mods",
    "auth_packet",
];

struct Gate {
    min_args: usize,
    must_join: bool,
}

fn gate(header: &str) -> Option<Gate> {
    let (min_args, must_join) = match header {
        "HI" => (1, false),
        "ID" => (2, false),
        "askchaa" => (0, false),
        "RC" => (0, false),
        "RM" => (0, false),
        "RD" => (0, false),
        "CC" => (3, true),
        "MS" => (15, true),
        "MC" => (2, true),
        "HP" => (2, true),
        "RT" => (1, true),
        "CT" => (2, true),
        "PE" => (3, true),
        "DE" => (1, true),
        "EE" => (4, true),
        "CH" => (0, false),
        "ZZ" => (0, true),
        "SETCASE" => (7, true),
        "CASEA" => (6, true),
        _ => return None,
    };
    Some(Gate {
        min_args,
        must_join,
    })
}

pub fn dispatch(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let Some(g) = gate(&p.header) else {
        return;
    };
    if p.body.len() < g.min_args {
        return;
    }
    if g.must_join && client.uid() == -1 {
        return;
    }
    match p.header.as_str() {
        "HI" => hdid(server, client, p),
        "ID" => ident(server, client),
        "askchaa" => res_count(server, client),
        "RC" => req_chars(server, client),
        "RM" => req_area_music(server, client),
        "RD" => req_done(server, client),
        "CC" => change_char(server, client, p),
        "MS" => ic_message(server, client, p),
        "MC" => music_or_area(server, client, p),
        "HP" => penalty(server, client, p),
        "RT" => wtce(server, client, p),
        "CT" => ooc(server, client, p),
        "PE" => add_evidence(server, client, p),
        "DE" => remove_evidence(server, client, p),
        "EE" => edit_evidence(server, client, p),
        "CH" => ping(client),
        "ZZ" => modcall(server, client, p),
        "SETCASE" => set_case(client, p),
        "CASEA" => case_announce(server, client, p),
        _ => {}
    }
}

// HI#<hdid>#%
fn hdid(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    if p.body[0].trim().is_empty() || client.uid() != -1 || !client.hdid().is_empty() {
        return;
    }
    // Only the hash of the hardware id is kept; raw tokens are neither stored
    // nor logged.
    let hdid = crate::client::hashed_id(decode(&p.body[0]).as_bytes());
    client.lock().hdid = hdid.clone();

    match server.db.is_banned(BanLookup::Hdid, &hdid) {
        Ok(Some(ban)) => {
            client.send_packet("BD", &[&ban_payload(&ban)]);
            client.disconnect();
            return;
        }
        Ok(None) => {}
        Err(e) => error!(err = %e, "ban lookup failed"),
    }

    client.send_packet("ID", &["0", BRAND, &encode(VERSION)]);
}

// ID#<software>#<version>#%
fn ident(server: &Arc<Server>, client: &Arc<Client>) {
    if client.uid() != -1 {
        return;
    }
    client.send_packet(
        "PN",
        &[
            &server.player_count().to_string(),
            &server.config.max_players.to_string(),
            &encode(&server.config.description),
        ],
    );
    client.send_packet("FL", &FEATURES);
    if !server.config.asset_url.is_empty() {
        client.send_packet("ASS", &[&server.config.asset_url]);
    }
}

// askchaa#%
fn res_count(server: &Arc<Server>, client: &Arc<Client>) {
    if client.uid() != -1 || client.hdid().is_empty() {
        return;
    }
    if server.player_count() >= server.config.max_players as i32 {
        info!("player limit reached");
        client.send_packet("BD", &["This server is currently full."]);
        client.disconnect();
        return;
    }
    // Gates RD so the capacity check cannot be skipped.
    client.lock().joining = true;
    client.send_packet(
        "SI",
        &[
            &server.characters.len().to_string(),
            &server.areas[0].evidence_len().to_string(),
            &server.music.len().to_string(),
        ],
    );
}

// RC#%
fn req_chars(server: &Arc<Server>, client: &Arc<Client>) {
    let refs: Vec<&str> = server.characters.iter().map(String::as_str).collect();
    client.send_packet("SC", &refs);
}

// RM#%
fn req_area_music(server: &Arc<Server>, client: &Arc<Client>) {
    client.write_raw(format!(
        "SM#{}#{}#%",
        server.area_names,
        server.music.join("#")
    ));
}

// RD#%
fn req_done(server: &Arc<Server>, client: &Arc<Client>) {
    {
        let st = client.lock();
        if st.uid != -1 || !st.joining || st.hdid.is_empty() {
            return;
        }
    }
    let Some(uid) = server.uids.acquire() else {
        client.send_packet("BD", &["This server is currently full."]);
        client.disconnect();
        return;
    };
    {
        let mut st = client.lock();
        st.uid = uid;
        st.area = 0;
        st.char_id = -1;
    }
    server.add_player();
    server.areas[0].add_char(-1);

    server.send_area_snapshot(client, 0);
    client.send_packet("DONE", &[]);
    server.send_all_arups();
    if !server.config.motd.is_empty() {
        server.server_message(client, &server.config.motd);
    }
    info!(uid, ipid = %client.ipid, "client joined the server");
}

// CC#<?>#<char id>#<?>#%
fn change_char(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let Ok(new_id) = p.body[1].parse::<i32>() else {
        return;
    };
    if new_id != -1
        && (new_id < 0 || new_id as usize >= server.characters.len())
    {
        return;
    }
    if server.change_character(client, new_id) {
        client.send_packet("PV", &["0", "CID", &new_id.to_string()]);
    }
}

// MS#...#% — the IC validation pipeline.
//
// Clients send 15 to 26 arguments depending on version; the server fans out a
// 28-argument form with two pairing slots spliced in at 19 and 20. The slots
// start as copies of arguments 17 and 18 and are overwritten with the
// partner's character name and emote when pairing succeeds.
fn ic_message(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    let char_id = client.char_id();

    if char_id == -1 || !client.can_speak(area) {
        server.server_message(client, "You are not allowed to speak in this area.");
        return;
    }

    // Playback cursor controls: a lone ">" or "<" replays the next or
    // previous recorded statement instead of speaking.
    let raw_msg = p.body.get(4).cloned().unwrap_or_default();
    {
        let mut st = area.lock();
        if st.testimony.state == RecorderState::Playback {
            let trimmed = decode(&raw_msg).trim().to_string();
            if trimmed == ">" || trimmed == "<" {
                if trimmed == ">" {
                    st.testimony.advance();
                } else {
                    st.testimony.rewind();
                }
                let stmt = st.testimony.current().map(str::to_string);
                drop(st);
                if let Some(s) = stmt {
                    server.write_raw_to_area(area_idx, &format!("MS#{s}#%"));
                }
                return;
            }
        }
    }

    // Copy whatever arrived into a full 26-slot buffer, then splice in the
    // two pairing placeholders.
    let mut out: Vec<String> = vec![String::new(); 26];
    for (slot, arg) in out.iter_mut().zip(p.body.iter()) {
        *slot = arg.clone();
    }
    let (dup17, dup18) = (out[17].clone(), out[18].clone());
    out.insert(19, dup17);
    out.insert(20, dup18);

    client.lock().pos = out[5].clone();

    let Ok(mut emote_mod) = out[7].parse::<i32>() else {
        return;
    };
    if emote_mod == 4 {
        // A value of 4 crashes old clients.
        emote_mod = 6;
        out[7] = "6".to_string();
    }
    let Ok(objection) = out[10].split('&').next().unwrap_or("").parse::<i32>() else {
        return;
    };
    let Ok(evi) = out[11].parse::<i32>() else {
        return;
    };

    for idx in [18, 21, 22] {
        if out[idx].is_empty() {
            out[idx] = "0".to_string();
        }
    }
    // Additive only holds when the same character spoke last.
    if out[26].is_empty() || area.last_speaker() != char_id {
        out[26] = "0".to_string();
    }
    // Forced non-interrupting preanimations clamp the emote modifier.
    if (area.no_interrupt() && emote_mod != 0) || out[18] == "1" {
        out[18] = "1".to_string();
        if emote_mod == 1 || emote_mod == 2 {
            emote_mod = 0;
            out[7] = "0".to_string();
        } else if emote_mod == 6 {
            emote_mod = 5;
            out[7] = "5".to_string();
        }
    }

    const DESK_MODS: [&str; 7] = ["chat", "0", "1", "2", "3", "4", "5"];
    if !DESK_MODS.contains(&out[0].as_str()) {
        return;
    }
    let char_name = &server.characters[char_id as usize];
    if !char_name.eq_ignore_ascii_case(&out[2]) && !area.iniswap_allowed() {
        server.server_message(client, "Iniswapping is not allowed in this area.");
        return;
    }
    if decode(&raw_msg).chars().count() > server.config.max_message_length {
        server.server_message(client, "Your message exceeds the maximum message length!");
        return;
    }
    if raw_msg == client.lock().last_msg {
        return;
    }
    if !(0..=6).contains(&emote_mod) {
        return;
    }
    if out[8] != char_id.to_string() {
        return;
    }
    if !(0..=4).contains(&objection) {
        return;
    }
    if evi < 0 || evi as usize > area.evidence_len() {
        return;
    }
    if !is_binary(&out[12]) || !is_binary(&out[13]) {
        return;
    }
    let Ok(text_color) = out[14].parse::<i32>() else {
        return;
    };
    if !(0..=6).contains(&text_color) {
        return;
    }
    if out[15].chars().count() > 30 {
        server.server_message(client, "Your showname is too long!");
        return;
    }
    if [18, 21, 22, 26].iter().any(|&i| !is_binary(&out[i])) {
        return;
    }

    // Pairing: adopt the partner's stored info only when they want us back,
    // on the same position.
    if !out[16].is_empty() && out[16] != "-1" {
        let Ok(pid) = out[16].split('^').next().unwrap_or("").parse::<i32>() else {
            return;
        };
        if pid < 0 || pid as usize >= server.characters.len() || pid == char_id {
            return;
        }
        client.lock().pair.wanted = pid;
        let my_pos = client.lock().pos.clone();
        let mut paired = false;
        for other in server.clients_snapshot() {
            if Arc::ptr_eq(&other, client) {
                continue;
            }
            let ost = other.lock();
            if ost.uid != -1
                && ost.area == area_idx
                && ost.char_id == pid
                && ost.pos == my_pos
                && ost.pair.wanted == char_id
            {
                out[19] = ost.pair.name.clone();
                out[20] = ost.pair.emote.clone();
                paired = true;
                break;
            }
        }
        if !paired {
            out[16] = "-1^".to_string();
        }
    }

    // Self offset, "x" or "x&y".
    if !out[17].is_empty() {
        let decoded = decode(&out[17]);
        let mut parts = decoded.split('&');
        let Some(Ok(x)) = parts.next().map(str::parse::<i32>) else {
            return;
        };
        if !(-100..=100).contains(&x) {
            return;
        }
        if let Some(ys) = parts.next() {
            let Ok(y) = ys.parse::<i32>() else {
                return;
            };
            if !(-100..=100).contains(&y) {
                return;
            }
        }
    }

    {
        let mut st = client.lock();
        st.pair.name = out[2].clone();
        st.pair.emote = out[3].clone();
        st.pair.flip = out[12].clone();
        st.pair.offset = out[17].clone();
        st.last_msg = raw_msg.clone();
    }
    area.set_last_speaker(char_id);

    if client.checked_mute() == Mute::Parrot {
        let line = server
            .parrot_lines
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Squawk!".to_string());
        out[4] = encode(&line);
    }
    if client.lock().narrator {
        // Narration renders text with no sprite.
        out[2] = String::new();
    }

    // Feed the testimony recorder before fanning out.
    {
        let joined = out.join("#");
        let mut st = area.lock();
        match st.testimony.state {
            RecorderState::Recording => st.testimony.append(&joined),
            RecorderState::Updating => {
                st.testimony.update(&joined);
                st.testimony.state = RecorderState::Playback;
            }
            RecorderState::Inserting => {
                st.testimony.insert(&joined);
                st.testimony.state = RecorderState::Playback;
            }
            _ => {}
        }
    }

    let refs: Vec<&str> = out.iter().map(String::as_str).collect();
    server.write_to_area(area_idx, "MS", &refs);
    server.add_to_buffer(client, "IC", &format!("\"{raw_msg}\""), false);
}

fn is_binary(s: &str) -> bool {
    s == "0" || s == "1"
}

// MC#<song|area>#<char id>#...#% — two packets in one header: a music change
// or an area move. The split happens here, at the boundary.
fn music_or_area(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    if p.body[1] != client.char_id().to_string() {
        return;
    }

    if server.music.iter().any(|m| m == &p.body[0]) {
        play_music(server, client, p);
    } else {
        let wanted = decode(&p.body[0]);
        let Some(target) = server.areas.iter().position(|a| a.name() == wanted) else {
            return;
        };
        if target == client.area_index() {
            return;
        }
        {
            use crate::area::LockState;
            use crate::permissions;
            let dest = &server.areas[target];
            if dest.lock_state() == LockState::Locked
                && !dest.is_invited(client.uid())
                && !client.has_permission(permissions::BYPASS_LOCK)
            {
                server.server_message(client, "You are not invited to that area.");
                return;
            }
        }
        server.add_to_buffer(client, "AREA", "Left area.", false);
        if server.change_area(client, target).is_ok() {
            server.add_to_buffer(client, "AREA", "Joined area.", false);
        }
    }
}

fn play_music(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_change_music(area) {
        server.server_message(client, "You are not allowed to change the music in this area.");
        return;
    }
    let mut song = p.body[0].clone();
    if !song.contains('.') {
        // A category row stops the music.
        song = "~stop.mp3".to_string();
        server.add_to_buffer(client, "MUSIC", "Stopped the music.", false);
    } else {
        server.add_to_buffer(client, "MUSIC", &format!("Changed music to {song}."), false);
    }
    let name = if p.body.len() > 2 {
        p.body[2].clone()
    } else {
        server.current_character(client)
    };
    let effects = if p.body.len() > 3 {
        p.body[3].clone()
    } else {
        "0".to_string()
    };
    server.write_to_area(area_idx, "MC", &[&song, &p.body[1], &name, "1", "0", &effects]);
}

// HP#<bar>#<value>#%
fn penalty(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if client.char_id() == -1 || !client.can_speak(area) || !client.can_judge() {
        server.server_message(
            client,
            "You are not allowed to change the penalty bar in this area.",
        );
        return;
    }
    let (Ok(bar), Ok(value)) = (p.body[0].parse::<i32>(), p.body[1].parse::<i32>()) else {
        return;
    };
    if !area.set_hp(bar, value) {
        return;
    }
    server.write_to_area(area_idx, "HP", &[&p.body[0], &p.body[1]]);

    let side = match bar {
        1 => "Defense",
        _ => "Prosecution",
    };
    server.add_to_buffer(client, "JUD", &format!("Set {side} HP to {value}."), false);
}

// RT#<animation>#%
fn wtce(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if client.char_id() == -1 || !client.can_speak(area) || !client.can_judge() {
        server.server_message(client, "You are not allowed to play WT/CE in this area.");
        return;
    }
    server.write_to_area(area_idx, "RT", &[&p.body[0]]);
    server.add_to_buffer(client, "JUD", "Played WT/CE animation.", false);
}

// CT#<name>#<message>#%
fn ooc(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let username = decode(p.body[0].trim());
    if username.is_empty()
        || username == server.config.name
        || username.chars().count() > 30
    {
        server.server_message(client, "Invalid username.");
        return;
    }
    if p.body[1].chars().count() > server.config.max_message_length {
        server.server_message(client, "Your message exceeds the maximum message length!");
        return;
    }
    for other in server.clients_snapshot() {
        if !Arc::ptr_eq(&other, client) && other.ooc_name() == username {
            server.server_message(client, "That username is already taken.");
            return;
        }
    }
    client.lock().ooc_name = username.clone();

    if p.body[1].starts_with('/') {
        let decoded = decode(&p.body[1]);
        let (command, args) = extract_command(&decoded);
        if command.is_empty() {
            server.server_message(client, "Invalid command.");
            return;
        }
        commands::parse_command(server, client, &command, args);
        return;
    }

    if !client.can_speak_ooc() {
        server.server_message(client, "You are muted from sending OOC messages.");
        return;
    }
    server.write_to_area(
        client.area_index(),
        "CT",
        &[&encode(&username), &p.body[1], "0"],
    );
    server.add_to_buffer(client, "OOC", &format!("\"{}\"", p.body[1]), false);
}

/// Split `/command arg arg` into the `[a-z]+` command word and its arguments.
pub fn extract_command(decoded: &str) -> (String, Vec<String>) {
    let rest = decoded.strip_prefix('/').unwrap_or(decoded);
    let end = rest
        .find(|ch: char| !ch.is_ascii_lowercase())
        .unwrap_or(rest.len());
    let command = rest[..end].to_string();
    let mut parts = rest[end..].split(' ');
    parts.next();
    let args: Vec<String> = parts.map(str::to_string).collect();
    (command, args)
}

// PE#<name>#<description>#<image>#%
fn add_evidence(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_alter_evidence(area) {
        server.server_message(client, "You are not allowed to alter evidence in this area.");
        return;
    }
    area.add_evidence(p.body.join("&"));
    broadcast_evidence(server, area_idx);
    server.add_to_buffer(
        client,
        "EVI",
        &format!("Added evidence: {} | {}", p.body[0], p.body[1]),
        false,
    );
}

// DE#<id>#%
fn remove_evidence(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_alter_evidence(area) {
        server.server_message(client, "You are not allowed to alter evidence in this area.");
        return;
    }
    let Ok(id) = p.body[0].parse::<usize>() else {
        return;
    };
    area.remove_evidence(id);
    broadcast_evidence(server, area_idx);
    server.add_to_buffer(client, "EVI", &format!("Removed evidence {id}."), false);
}

// EE#<id>#<name>#<description>#<image>#%
fn edit_evidence(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_alter_evidence(area) {
        server.server_message(client, "You are not allowed to alter evidence in this area.");
        return;
    }
    let Ok(id) = p.body[0].parse::<usize>() else {
        return;
    };
    area.edit_evidence(id, p.body[1..].join("&"));
    broadcast_evidence(server, area_idx);
    server.add_to_buffer(
        client,
        "EVI",
        &format!("Updated evidence {} to {} | {}", id, p.body[1], p.body[2]),
        false,
    );
}

pub fn broadcast_evidence(server: &Arc<Server>, area_idx: usize) {
    let evidence = server.areas[area_idx].evidence();
    let refs: Vec<&str> = evidence.iter().map(String::as_str).collect();
    server.write_to_area(area_idx, "LE", &refs);
}

// CH#%
fn ping(client: &Arc<Client>) {
    client.send_packet("CHECK", &[]);
}

// ZZ#<reason>#%
fn modcall(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let reason = p.body.first().cloned().unwrap_or_default();
    server.add_to_buffer(
        client,
        "MOD",
        &format!("Called moderator for reason: {reason}"),
        false,
    );

    let area = &server.areas[client.area_index()];
    let alert = format!(
        "[{}] {} ({}): {}",
        area.name(),
        server.current_character(client),
        client.ipid,
        reason
    );
    for c in server.clients_snapshot() {
        if c.authenticated() {
            c.send_packet("ZZ", &[&alert]);
        }
    }

    // Every modcall flushes the area buffer to a report; the webhook mirrors
    // both, best-effort.
    let buffer = area.buffer();
    let report_name = server.reports.write_report(area.name(), &buffer);
    if let Some(webhook) = server.webhook.clone() {
        let character = server.current_character(client);
        let area_name = area.name().to_string();
        tokio::spawn(async move {
            if let Err(e) = webhook.post_modcall(&character, &area_name, &reason).await {
                error!(err = %e, "failed to post modcall webhook");
            }
            if let Some(name) = report_name {
                if let Err(e) = webhook.post_report(&name, buffer.join("\n")).await {
                    error!(err = %e, "failed to upload report");
                }
            }
        });
    }
}

// SETCASE#<caselist>#<cm>#<def>#<pro>#<judge>#<jury>#<steno>#%
fn set_case(client: &Arc<Client>, p: &Packet) {
    let mut prefs = [false; 5];
    for (i, raw) in p.body[2..].iter().take(5).enumerate() {
        let Some(b) = parse_bool(raw) else {
            return;
        };
        prefs[i] = b;
    }
    client.lock().case_alerts = prefs;
}

// CASEA#<message>#<def>#<pro>#<judge>#<jury>#<steno>#%
fn case_announce(server: &Arc<Server>, client: &Arc<Client>, p: &Packet) {
    let area = &server.areas[client.area_index()];
    if client.char_id() == -1 || !client.has_cm_permission(area) {
        server.server_message(client, "You are not allowed to send case alerts in this area.");
        return;
    }

    let mut wanted = [false; 5];
    for (i, raw) in p.body[1..].iter().take(5).enumerate() {
        let Some(b) = parse_bool(raw) else {
            return;
        };
        wanted[i] = b;
    }

    // Old client versions need the trailing extra argument.
    let alert = format!(
        "CASEA#CASE ANNOUNCEMENT: {} in {} needs players for {}#{}#1#%",
        server.current_character(client),
        area.name(),
        p.body[0],
        p.body[1..].join("#")
    );

    for c in server.clients_snapshot() {
        if Arc::ptr_eq(&c, client) || c.uid() == -1 {
            continue;
        }
        let prefs = c.lock().case_alerts;
        if wanted.iter().zip(prefs.iter()).any(|(w, p)| *w && *p) {
            c.write_raw(alert.clone());
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_table_matches_wire_contract() {
        let g = gate("MS").unwrap();
        assert_eq!(g.min_args, 15);
        assert!(g.must_join);

        let g = gate("HI").unwrap();
        assert_eq!(g.min_args, 1);
        assert!(!g.must_join);

        assert!(gate("SETCASE").unwrap().must_join);
        assert!(gate("nonsense").is_none());
    }

    #[test]
    fn command_extraction() {
        let (cmd, args) = extract_command("/roll 2d6 -p");
        assert_eq!(cmd, "roll");
        assert_eq!(args, vec!["2d6", "-p"]);

        let (cmd, args) = extract_command("/motd");
        assert_eq!(cmd, "motd");
        assert!(args.is_empty());

        // Uppercase is not a command word.
        let (cmd, _) = extract_command("/ROLL 2d6");
        assert!(cmd.is_empty());
    }

    #[test]
    fn ms_splice_duplicates_17_and_18() {
        // The observable core of the 26 -> 28 rewrite.
        let mut out: Vec<String> = (0..26).map(|i| i.to_string()).collect();
        let (dup17, dup18) = (out[17].clone(), out[18].clone());
        out.insert(19, dup17);
        out.insert(20, dup18);
        assert_eq!(out.len(), 28);
        assert_eq!(out[19], "17");
        assert_eq!(out[20], "18");
        assert_eq!(out[18], "18");
        assert_eq!(out[21], "19");
        assert_eq!(out[27], "25");
    }

    #[test]
    fn bool_parsing_accepts_wire_forms() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
