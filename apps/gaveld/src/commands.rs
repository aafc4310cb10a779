//! OOC `/command` engine. Every command carries its minimum argument count,
//! usage text and required permission bits; the gate also admits area CMs for
//! commands whose requirement is exactly the CM bit.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use tracing::error;

use crate::area::EvidenceMode;
use crate::area::LockState;
use crate::area::Status;
use crate::client::Client;
use crate::client::Mute;
use crate::cmdarg::Flags;
use crate::db::format_until;
use crate::db::BanLookup;
use crate::handlers::broadcast_evidence;
use crate::permissions;
use crate::server::Server;
use crate::server::BRAND;
use crate::server::VERSION;
use crate::testimony::RecorderState;

pub struct Command {
    pub name: &'static str,
    pub min_args: usize,
    pub usage: &'static str,
    pub desc: &'static str,
    pub req_perms: u64,
}

pub const COMMANDS: &[Command] = &[
    Command {
        name: "about",
        min_args: 0,
        usage: "Usage: /about",
        desc: "Prints version information.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "allowcms",
        min_args: 1,
        usage: "Usage: /allowcms <true|false>",
        desc: "Toggles allowing CMs on or off.",
        req_perms: permissions::MODIFY_AREA,
    },
    Command {
        name: "allowiniswap",
        min_args: 1,
        usage: "Usage: /allowiniswap <true|false>",
        desc: "Toggles iniswapping on or off.",
        req_perms: permissions::MODIFY_AREA,
    },
    Command {
        name: "areainfo",
        min_args: 0,
        usage: "Usage: /areainfo",
        desc: "Prints area settings.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "ban",
        min_args: 3,
        usage: "Usage: /ban -u <uid1>,<uid2>... | -i <ipid1>,<ipid2>... [-d duration] <reason>",
        desc: "Bans user(s) from the server.",
        req_perms: permissions::BAN,
    },
    Command {
        name: "bg",
        min_args: 1,
        usage: "Usage: /bg <background>",
        desc: "Sets the area's background.",
        req_perms: permissions::CM,
    },
    Command {
        name: "charselect",
        min_args: 0,
        usage: "Usage: /charselect [uid1],[uid2]...",
        desc: "Return to character select.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "cm",
        min_args: 0,
        usage: "Usage: /cm [uid1],[uid2]...",
        desc: "Promote to area CM.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "doc",
        min_args: 0,
        usage: "Usage: /doc [-c] [doc]\n-c: Clear the doc.",
        desc: "Prints or sets the area's document.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "editban",
        min_args: 2,
        usage: "Usage: /editban [-d duration] [-r reason] <id1>,<id2>...",
        desc: "Changes the duration or reason of ban(s).",
        req_perms: permissions::BAN,
    },
    Command {
        name: "evimode",
        min_args: 1,
        usage: "Usage: /evimode <any|cms|mods>",
        desc: "Sets the area's evidence mode.",
        req_perms: permissions::CM,
    },
    Command {
        name: "forcebglist",
        min_args: 1,
        usage: "Usage: /forcebglist <true|false>",
        desc: "Toggles enforcing the server BG list on or off.",
        req_perms: permissions::MODIFY_AREA,
    },
    Command {
        name: "getban",
        min_args: 0,
        usage: "Usage: /getban [-b banid | -i ipid]",
        desc: "Prints ban(s) matching the search parameters, or the most recent bans.",
        req_perms: permissions::BAN_INFO,
    },
    Command {
        name: "global",
        min_args: 1,
        usage: "Usage: /global <message>",
        desc: "Sends a global message.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "invite",
        min_args: 1,
        usage: "Usage: /invite <uid1>,<uid2>...",
        desc: "Invites user(s) to the current area.",
        req_perms: permissions::CM,
    },
    Command {
        name: "kick",
        min_args: 3,
        usage: "Usage: /kick -u <uid1>,<uid2>... | -i <ipid1>,<ipid2>... <reason>",
        desc: "Kicks user(s) from the server.",
        req_perms: permissions::KICK,
    },
    Command {
        name: "kickarea",
        min_args: 1,
        usage: "Usage: /kickarea <uid1>,<uid2>...",
        desc: "Kicks user(s) from the current area.",
        req_perms: permissions::CM,
    },
    Command {
        name: "lock",
        min_args: 0,
        usage: "Usage: /lock [-s]\n-s: Sets the area to be spectatable.",
        desc: "Locks the current area or sets it to spectatable.",
        req_perms: permissions::CM,
    },
    Command {
        name: "lockbg",
        min_args: 1,
        usage: "Usage: /lockbg <true|false>",
        desc: "Toggles locking the BG on or off.",
        req_perms: permissions::MODIFY_AREA,
    },
    Command {
        name: "lockmusic",
        min_args: 1,
        usage: "Usage: /lockmusic <true|false>",
        desc: "Toggles CM-only music on or off.",
        req_perms: permissions::CM,
    },
    Command {
        name: "log",
        min_args: 1,
        usage: "Usage: /log <area>",
        desc: "Prints an area's log buffer.",
        req_perms: permissions::LOG,
    },
    Command {
        name: "login",
        min_args: 2,
        usage: "Usage: /login <username> <password>",
        desc: "Logs in as moderator.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "logout",
        min_args: 0,
        usage: "Usage: /logout",
        desc: "Logs out as moderator.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "mkusr",
        min_args: 3,
        usage: "Usage: /mkusr <username> <password> <role>",
        desc: "Creates a new moderator user.",
        req_perms: permissions::ADMIN,
    },
    Command {
        name: "mod",
        min_args: 1,
        usage: "Usage: /mod [-g] <message>\n-g: Send the message globally.",
        desc: "Sends a message speaking officially as a moderator.",
        req_perms: permissions::MOD_SPEAK,
    },
    Command {
        name: "modchat",
        min_args: 1,
        usage: "Usage: /modchat <message>",
        desc: "Sends a message to other moderators.",
        req_perms: permissions::MOD_CHAT,
    },
    Command {
        name: "motd",
        min_args: 0,
        usage: "Usage: /motd",
        desc: "Sends the server's message of the day.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "move",
        min_args: 1,
        usage: "Usage: /move [-u <uid1>,<uid2>...] <area>",
        desc: "Moves to an area.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "mute",
        min_args: 1,
        usage: "Usage: /mute [-ic][-ooc][-m][-j][-d duration][-r reason] <uid1>,<uid2>...\n-ic: Mute IC.\n-ooc: Mute OOC.\n-m: Mute music.\n-j: Mute judge.",
        desc: "Mutes user(s) from IC, OOC, changing music, and/or judge controls.",
        req_perms: permissions::MUTE,
    },
    Command {
        name: "narrator",
        min_args: 0,
        usage: "Usage: /narrator",
        desc: "Toggles narrator mode on or off.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "nointpres",
        min_args: 1,
        usage: "Usage: /nointpres <true|false>",
        desc: "Toggles non-interrupting preanims in the current area on or off.",
        req_perms: permissions::MODIFY_AREA,
    },
    Command {
        name: "parrot",
        min_args: 1,
        usage: "Usage: /parrot [-d duration][-r reason] <uid1>,<uid2>...",
        desc: "Parrots user(s).",
        req_perms: permissions::MUTE,
    },
    Command {
        name: "play",
        min_args: 1,
        usage: "Usage: /play <song>",
        desc: "Plays a song.",
        req_perms: permissions::CM,
    },
    Command {
        name: "players",
        min_args: 0,
        usage: "Usage: /players [-a]\n-a: Target all areas.",
        desc: "Shows players in the current or all areas.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "pm",
        min_args: 2,
        usage: "Usage: /pm <uid1>,<uid2>... <message>",
        desc: "Sends a private message.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "rmusr",
        min_args: 1,
        usage: "Usage: /rmusr <username>",
        desc: "Removes a moderator user.",
        req_perms: permissions::ADMIN,
    },
    Command {
        name: "roll",
        min_args: 1,
        usage: "Usage: /roll [-p] <dice>d<sides>\n-p: Sets the roll to be private.",
        desc: "Rolls dice.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "setrole",
        min_args: 2,
        usage: "Usage: /setrole <username> <role>",
        desc: "Changes a moderator user's role.",
        req_perms: permissions::ADMIN,
    },
    Command {
        name: "status",
        min_args: 1,
        usage: "Usage: /status <status>",
        desc: "Sets the current area's status.",
        req_perms: permissions::CM,
    },
    Command {
        name: "swapevi",
        min_args: 2,
        usage: "Usage: /swapevi <id1> <id2>",
        desc: "Swaps index of evidence.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "testimony",
        min_args: 0,
        usage: "Usage: /testimony [record|stop|play|update|insert|delete]",
        desc: "Drives the area's testimony recorder, or prints the current testimony.",
        req_perms: permissions::NONE,
    },
    Command {
        name: "unban",
        min_args: 1,
        usage: "Usage: /unban <id1>,<id2>...",
        desc: "Nullifies ban(s).",
        req_perms: permissions::BAN,
    },
    Command {
        name: "uncm",
        min_args: 0,
        usage: "Usage: /uncm [uid1],[uid2]...",
        desc: "Removes CM(s) from the current area.",
        req_perms: permissions::CM,
    },
    Command {
        name: "uninvite",
        min_args: 1,
        usage: "Usage: /uninvite <uid1>,<uid2>...",
        desc: "Uninvites user(s) from the current area.",
        req_perms: permissions::CM,
    },
    Command {
        name: "unlock",
        min_args: 0,
        usage: "Usage: /unlock",
        desc: "Unlocks the current area.",
        req_perms: permissions::CM,
    },
    Command {
        name: "unmute",
        min_args: 1,
        usage: "Usage: /unmute <uid1>,<uid2>...",
        desc: "Unmutes user(s).",
        req_perms: permissions::MUTE,
    },
];

pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Gate and dispatch one command invocation.
pub fn parse_command(server: &Arc<Server>, client: &Arc<Client>, command: &str, args: Vec<String>) {
    // Repeated spaces in the OOC line produce empty tokens; drop them.
    let args: Vec<String> = args.into_iter().filter(|a| !a.is_empty()).collect();

    if command == "help" {
        help(server, client);
        return;
    }

    let Some(cmd) = find(command) else {
        server.server_message(client, "Invalid command.");
        return;
    };
    let area = &server.areas[client.area_index()];
    let allowed = client.has_permission(cmd.req_perms)
        || (cmd.req_perms == permissions::CM && area.has_cm(client.uid()));
    if !allowed {
        server.server_message(client, "You do not have permission to use that command.");
        return;
    }
    if args.iter().any(|a| a == "-h") {
        server.server_message(client, cmd.usage);
        return;
    }
    if args.len() < cmd.min_args {
        server.server_message(client, &format!("Not enough arguments.\n{}", cmd.usage));
        return;
    }

    match cmd.name {
        "about" => cmd_about(server, client),
        "allowcms" => cmd_toggle(server, client, &args, Toggle::AllowCms),
        "allowiniswap" => cmd_toggle(server, client, &args, Toggle::AllowIniswap),
        "areainfo" => cmd_areainfo(server, client),
        "ban" => cmd_ban(server, client, &args, cmd.usage),
        "bg" => cmd_bg(server, client, &args),
        "charselect" => cmd_charselect(server, client, &args),
        "cm" => cmd_cm(server, client, &args),
        "doc" => cmd_doc(server, client, &args),
        "editban" => cmd_editban(server, client, &args, cmd.usage),
        "evimode" => cmd_evimode(server, client, &args),
        "forcebglist" => cmd_toggle(server, client, &args, Toggle::ForceBgList),
        "getban" => cmd_getban(server, client, &args),
        "global" => cmd_global(server, client, &args),
        "invite" => cmd_invite(server, client, &args),
        "kick" => cmd_kick(server, client, &args, cmd.usage),
        "kickarea" => cmd_kickarea(server, client, &args),
        "lock" => cmd_lock(server, client, &args),
        "lockbg" => cmd_toggle(server, client, &args, Toggle::LockBg),
        "lockmusic" => cmd_toggle(server, client, &args, Toggle::LockMusic),
        "log" => cmd_log(server, client, &args),
        "login" => cmd_login(server, client, &args),
        "logout" => cmd_logout(server, client),
        "mkusr" => cmd_mkusr(server, client, &args),
        "mod" => cmd_mod(server, client, &args, cmd.usage),
        "modchat" => cmd_modchat(server, client, &args),
        "motd" => cmd_motd(server, client),
        "move" => cmd_move(server, client, &args, cmd.usage),
        "mute" => cmd_mute(server, client, &args, cmd.usage),
        "narrator" => cmd_narrator(server, client),
        "nointpres" => cmd_toggle(server, client, &args, Toggle::NoIntPres),
        "parrot" => cmd_parrot(server, client, &args, cmd.usage),
        "play" => cmd_play(server, client, &args),
        "players" => cmd_players(server, client, &args),
        "pm" => cmd_pm(server, client, &args),
        "rmusr" => cmd_rmusr(server, client, &args),
        "roll" => cmd_roll(server, client, &args),
        "setrole" => cmd_setrole(server, client, &args),
        "status" => cmd_status(server, client, &args),
        "swapevi" => cmd_swapevi(server, client, &args),
        "testimony" => cmd_testimony(server, client, &args),
        "unban" => cmd_unban(server, client, &args),
        "uncm" => cmd_uncm(server, client, &args),
        "uninvite" => cmd_uninvite(server, client, &args),
        "unlock" => cmd_unlock(server, client),
        "unmute" => cmd_unmute(server, client, &args),
        _ => server.server_message(client, "Invalid command."),
    }
}

fn help(server: &Arc<Server>, client: &Arc<Client>) {
    let area = &server.areas[client.area_index()];
    let mut lines: Vec<String> = COMMANDS
        .iter()
        .filter(|cmd| {
            client.has_permission(cmd.req_perms)
                || (cmd.req_perms == permissions::CM && area.has_cm(client.uid()))
        })
        .map(|cmd| format!("- /{}: {}", cmd.name, cmd.desc))
        .collect();
    lines.sort();
    server.server_message(
        client,
        &format!(
            "Recognized commands:\n{}\n\nTo view detailed usage on a command, do /<command> -h",
            lines.join("\n")
        ),
    );
}

// Target resolution.

fn get_uid_list(server: &Server, items: &[String]) -> Vec<Arc<Client>> {
    let mut out = Vec::new();
    for s in items {
        let Ok(uid) = s.trim().parse::<i32>() else {
            continue;
        };
        if uid == -1 {
            continue;
        }
        if let Some(c) = server.client_by_uid(uid) {
            out.push(c);
        }
    }
    out
}

fn get_ipid_list(server: &Server, items: &[String]) -> Vec<Arc<Client>> {
    let mut out = Vec::new();
    for s in items {
        out.extend(server.clients_by_ipid(s.trim()));
    }
    out
}

fn uid_report(targets: &[i32]) -> String {
    targets
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"3d"`, `"1h30m"`, `"90s"` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let mut total = 0u64;
    let mut num = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num.push(ch);
            continue;
        }
        let n: u64 = num.parse().ok()?;
        num.clear();
        let unit: u64 = match ch {
            'd' => 24 * 60 * 60,
            'h' => 60 * 60,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(n.checked_mul(unit)?)?;
    }
    if !num.is_empty() {
        return None;
    }
    Some(total)
}

fn parse_toggle(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// Commands.

fn cmd_about(server: &Arc<Server>, client: &Arc<Client>) {
    server.server_message(
        client,
        &format!("Running {BRAND} version {VERSION}, an Attorney Online 2 server."),
    );
}

#[derive(Clone, Copy)]
enum Toggle {
    AllowCms,
    AllowIniswap,
    NoIntPres,
    ForceBgList,
    LockBg,
    LockMusic,
}

fn cmd_toggle(server: &Arc<Server>, client: &Arc<Client>, args: &[String], which: Toggle) {
    let Some(v) = parse_toggle(&args[0]) else {
        server.server_message(client, "Argument not recognized.");
        return;
    };
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    let name = client.ooc_name();
    let (announce, log) = match which {
        Toggle::AllowCms => {
            area.set_cms_allowed(v);
            (
                format!(
                    "{} has {} CMs in this area.",
                    name,
                    if v { "allowed" } else { "disallowed" }
                ),
                format!("Set allowing CMs to {v}."),
            )
        }
        Toggle::AllowIniswap => {
            area.set_iniswap_allowed(v);
            (
                format!(
                    "{} has {} iniswapping in this area.",
                    name,
                    if v { "enabled" } else { "disabled" }
                ),
                format!("Set iniswapping to {v}."),
            )
        }
        Toggle::NoIntPres => {
            area.set_no_interrupt(v);
            (
                format!(
                    "{} has {} non-interrupting preanims in this area.",
                    name,
                    if v { "enabled" } else { "disabled" }
                ),
                format!("Set non-interrupting preanims to {v}."),
            )
        }
        Toggle::ForceBgList => {
            area.set_force_bglist(v);
            (
                format!(
                    "{} has {} the BG list in this area.",
                    name,
                    if v { "enforced" } else { "unenforced" }
                ),
                format!("Set the BG list to {v}."),
            )
        }
        Toggle::LockBg => {
            area.set_lock_bg(v);
            (
                format!(
                    "{} has {} the background in this area.",
                    name,
                    if v { "locked" } else { "unlocked" }
                ),
                format!("Set the background lock to {v}."),
            )
        }
        Toggle::LockMusic => {
            area.set_lock_music(v);
            (
                format!(
                    "{} has {} CM-only music in this area.",
                    name,
                    if v { "enabled" } else { "disabled" }
                ),
                format!("Set CM-only music to {v}."),
            )
        }
    };
    server.send_area_server_message(area_idx, &announce);
    server.add_to_buffer(client, "CMD", &log, false);
}

fn cmd_areainfo(server: &Arc<Server>, client: &Arc<Client>) {
    let area = &server.areas[client.area_index()];
    let st = area.lock();
    let out = format!(
        "\nBG: {}\nEvi mode: {}\nAllow iniswap: {}\nNon-interrupting pres: {}\nCMs allowed: {}\nForce BG list: {}\nBG locked: {}\nMusic locked: {}",
        st.background,
        st.evi_mode.as_str(),
        st.allow_iniswap,
        st.force_nointerrupt,
        st.allow_cms,
        st.force_bglist,
        st.lock_bg,
        st.lock_music
    );
    drop(st);
    server.server_message(client, &out);
}

fn cmd_ban(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new().list_flag("u").list_flag("i").value("d").parse(args);
    if flags.rest().is_empty() {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    }
    let targets = if !flags.list("u").is_empty() {
        get_uid_list(server, flags.list("u"))
    } else if !flags.list("i").is_empty() {
        get_ipid_list(server, flags.list("i"))
    } else {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    };

    let duration = flags
        .get("d")
        .unwrap_or(server.config.default_ban_duration.as_str())
        .to_string();
    let ban_time = Utc::now().timestamp();
    let until = if duration.eq_ignore_ascii_case("perma") {
        -1
    } else {
        match parse_duration(&duration) {
            Some(secs) => ban_time + secs as i64,
            None => {
                server.server_message(client, "Failed to ban: Cannot parse duration.");
                return;
            }
        }
    };
    let reason = flags.rest().join(" ");

    let mut count = 0;
    let mut banned_ipids: Vec<String> = Vec::new();
    for c in &targets {
        let id = match server.db.add_ban(
            &c.ipid,
            &c.hdid(),
            ban_time,
            until,
            &reason,
            &client.mod_name(),
        ) {
            Ok(id) => id,
            Err(e) => {
                error!(err = %e, "failed to store ban");
                server.server_message(client, "An unexpected error occured.");
                continue;
            }
        };
        if !banned_ipids.contains(&c.ipid) {
            banned_ipids.push(c.ipid.clone());
        }
        c.send_packet(
            "KB",
            &[&format!(
                "{}\nUntil: {}\nID: {}",
                reason,
                format_until(until),
                id
            )],
        );
        c.disconnect();
        count += 1;
    }
    server.server_message(client, &format!("Banned {count} clients."));
    server.add_to_buffer(
        client,
        "CMD",
        &format!(
            "Banned {} from server for {}: {}.",
            banned_ipids.join(", "),
            duration,
            reason
        ),
        true,
    );
}

fn cmd_bg(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if area.lock_bg() && !client.has_permission(permissions::MODIFY_AREA) {
        server.server_message(
            client,
            "You do not have permission to change the background in this area.",
        );
        return;
    }
    let bg = args.join(" ");
    if area.force_bglist() && !server.backgrounds.iter().any(|b| b == &bg) {
        server.server_message(client, "Invalid background.");
        return;
    }
    area.set_background(bg.clone());
    server.write_to_area(area_idx, "BN", &[&bg]);
    server.send_area_server_message(
        area_idx,
        &format!("{} set the background to {}.", client.ooc_name(), bg),
    );
    server.add_to_buffer(client, "CMD", &format!("Set BG to {bg}."), false);
}

fn cmd_charselect(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    if args.is_empty() {
        server.change_character(client, -1);
        client.send_packet("DONE", &[]);
        return;
    }
    let area = &server.areas[client.area_index()];
    if !client.has_cm_permission(area) {
        server.server_message(client, "You do not have permission to use that command.");
        return;
    }
    let targets = get_uid_list(server, &split_csv(&args[0]));
    let mut moved = Vec::new();
    for c in &targets {
        if c.area_index() != client.area_index() || c.char_id() == -1 {
            continue;
        }
        server.change_character(c, -1);
        c.send_packet("DONE", &[]);
        server.server_message(c, "You were moved back to character select.");
        moved.push(c.uid());
    }
    server.server_message(
        client,
        &format!("Moved {} users to character select.", moved.len()),
    );
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Moved {} to character select.", uid_report(&moved)),
        false,
    );
}

fn cmd_cm(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if client.char_id() == -1 {
        server.server_message(client, "You are spectating; you cannot become a CM.");
        return;
    }
    if !area.cms_allowed() && !client.has_cm_permission(area) {
        server.server_message(client, "You do not have permission to use that command.");
        return;
    }

    if args.is_empty() {
        if area.has_cm(client.uid()) {
            server.server_message(client, "You are already a CM in this area.");
            return;
        }
        if !area.cms().is_empty() && !client.has_permission(permissions::CM) {
            server.server_message(client, "This area already has a CM.");
            return;
        }
        area.add_cm(client.uid());
        server.server_message(client, "Successfully became a CM.");
        server.add_to_buffer(client, "CMD", "CMed self.", false);
    } else {
        if !client.has_cm_permission(area) {
            server.server_message(client, "You do not have permission to use that command.");
            return;
        }
        let targets = get_uid_list(server, &split_csv(&args[0]));
        let mut promoted = Vec::new();
        for c in &targets {
            if c.area_index() != area_idx || area.has_cm(c.uid()) {
                continue;
            }
            area.add_cm(c.uid());
            server.server_message(c, "You have become a CM in this area.");
            promoted.push(c.uid());
        }
        server.server_message(client, &format!("CMed {} users.", promoted.len()));
        server.add_to_buffer(
            client,
            "CMD",
            &format!("CMed {}.", uid_report(&promoted)),
            false,
        );
    }
    server.send_cm_arup();
}

fn cmd_doc(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if args.is_empty() {
        let doc = area.doc();
        if doc.is_empty() {
            server.server_message(client, "This area does not have a doc set.");
        } else {
            server.server_message(client, &doc);
        }
        return;
    }
    if !client.has_cm_permission(area) {
        server.server_message(client, "You do not have permission to change the doc.");
        return;
    }
    let flags = Flags::new().boolean("c").parse(args);
    if flags.has("c") {
        area.set_doc(String::new());
        server.send_area_server_message(
            area_idx,
            &format!("{} cleared the doc.", client.ooc_name()),
        );
    } else if !flags.rest().is_empty() {
        area.set_doc(flags.rest().join(" "));
        server.send_area_server_message(
            area_idx,
            &format!("{} updated the doc.", client.ooc_name()),
        );
    }
}

fn cmd_editban(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new().value("d").value("r").parse(args);
    let duration = flags.get("d");
    let reason = flags.get("r");
    if flags.rest().is_empty() || (duration.is_none() && reason.is_none()) {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    }

    let until = match duration {
        Some(d) if d.eq_ignore_ascii_case("perma") => Some(-1),
        Some(d) => match parse_duration(d) {
            Some(secs) => Some(Utc::now().timestamp() + secs as i64),
            None => {
                server.server_message(client, "Failed to edit ban: Cannot parse duration.");
                return;
            }
        },
        None => None,
    };

    let mut updated = Vec::new();
    for s in split_csv(&flags.rest()[0]) {
        let Ok(id) = s.parse::<i64>() else {
            continue;
        };
        if let Some(until) = until {
            if server.db.update_duration(id, until).is_err() {
                continue;
            }
        }
        if let Some(reason) = reason {
            if server.db.update_reason(id, reason).is_err() {
                continue;
            }
        }
        updated.push(s);
    }
    let report = updated.join(", ");
    server.server_message(client, &format!("Updated bans: {report}"));
    if let Some(d) = duration {
        server.add_to_buffer(
            client,
            "CMD",
            &format!("Edited bans: {report} to duration: {d}."),
            true,
        );
    }
    if let Some(r) = reason {
        server.add_to_buffer(
            client,
            "CMD",
            &format!("Edited bans: {report} to reason: {r}."),
            true,
        );
    }
}

fn cmd_evimode(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_alter_evidence(area) {
        server.server_message(client, "You are not allowed to change the evidence mode.");
        return;
    }
    let mode = match args[0].as_str() {
        "mods" => {
            if !client.has_permission(permissions::MOD_EVI) {
                server.server_message(client, "You do not have permission for this evidence mode.");
                return;
            }
            EvidenceMode::Mods
        }
        "cms" => EvidenceMode::Cms,
        "any" => EvidenceMode::Any,
        _ => {
            server.server_message(client, "Invalid evidence mode.");
            return;
        }
    };
    area.set_evi_mode(mode);
    server.send_area_server_message(
        area_idx,
        &format!("{} set the evidence mode to {}.", client.ooc_name(), args[0]),
    );
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Set the evidence mode to {}.", args[0]),
        false,
    );
}

fn cmd_getban(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let flags = Flags::new().value("b").value("i").parse(args);
    let entry = |b: &crate::db::BanInfo| {
        format!(
            "\nID: {}\nIPID: {}\nHDID: {}\nBanned on: {}\nUntil: {}\nReason: {}\nModerator: {}\n----------",
            b.id,
            b.ipid,
            b.hdid,
            crate::db::format_timestamp(b.time),
            format_until(b.duration),
            b.reason,
            b.moderator
        )
    };

    let mut out = "Bans:\n----------".to_string();
    if let Some(banid) = flags.get("b") {
        match server.db.get_ban(BanLookup::BanId, banid) {
            Ok(bans) if !bans.is_empty() => out.push_str(&entry(&bans[0])),
            _ => {
                server.server_message(client, "No ban with that ID exists.");
                return;
            }
        }
    } else if let Some(ipid) = flags.get("i") {
        match server.db.get_ban(BanLookup::Ipid, ipid) {
            Ok(bans) if !bans.is_empty() => {
                for b in &bans {
                    out.push_str(&entry(b));
                }
            }
            _ => {
                server.server_message(client, "No bans with that IPID exist.");
                return;
            }
        }
    } else {
        match server.db.get_recent_bans() {
            Ok(bans) => {
                for b in &bans {
                    out.push_str(&entry(b));
                }
            }
            Err(e) => {
                error!(err = %e, "failed to fetch recent bans");
                server.server_message(client, "An unexpected error occured.");
                return;
            }
        }
    }
    server.server_message(client, &out);
}

fn cmd_global(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    if !client.can_speak_ooc() {
        server.server_message(client, "You are muted from sending OOC messages.");
        return;
    }
    server.write_to_all(
        "CT",
        &[
            &format!("[GLOBAL] {}", client.ooc_name()),
            &args.join(" "),
            "1",
        ],
    );
}

fn cmd_invite(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if area.lock_state() == LockState::Free {
        server.server_message(client, "This area is unlocked.");
        return;
    }
    let targets = get_uid_list(server, &split_csv(&args[0]));
    let mut invited = Vec::new();
    for c in &targets {
        if area.add_invited(c.uid()) {
            server.server_message(c, &format!("You were invited to area {}.", area.name()));
            invited.push(c.uid());
        }
    }
    server.server_message(client, &format!("Invited {} users.", invited.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Invited {} to the area.", uid_report(&invited)),
        false,
    );
}

fn cmd_kick(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new().list_flag("u").list_flag("i").parse(args);
    if flags.rest().is_empty() {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    }
    let targets = if !flags.list("u").is_empty() {
        get_uid_list(server, flags.list("u"))
    } else if !flags.list("i").is_empty() {
        get_ipid_list(server, flags.list("i"))
    } else {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    };

    let reason = flags.rest().join(" ");
    let mut kicked = Vec::new();
    for c in &targets {
        kicked.push(c.ipid.clone());
        c.send_packet("KK", &[&reason]);
        c.disconnect();
    }
    server.server_message(client, &format!("Kicked {} clients.", kicked.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!(
            "Kicked {} from server for reason: {}.",
            kicked.join(", "),
            reason
        ),
        true,
    );
}

fn cmd_kickarea(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    if area_idx == 0 {
        server.server_message(client, "Failed to kick: Cannot kick a user from area 0.");
        return;
    }
    let targets = get_uid_list(server, &split_csv(&args[0]));
    let mut kicked = Vec::new();
    for c in &targets {
        if c.area_index() != area_idx || c.has_permission(permissions::BYPASS_LOCK) {
            continue;
        }
        if Arc::ptr_eq(c, client) {
            server.server_message(client, "You can't kick yourself from the area.");
            continue;
        }
        if server.change_area(c, 0).is_ok() {
            server.server_message(c, "You were kicked from the area!");
            kicked.push(c.uid());
        }
    }
    server.server_message(client, &format!("Kicked {} clients.", kicked.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Kicked {} from area.", uid_report(&kicked)),
        false,
    );
}

fn cmd_lock(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if args.iter().any(|a| a == "-s") {
        area.set_lock(LockState::Spectatable);
        server.send_area_server_message(
            area_idx,
            &format!("{} set the area to spectatable.", client.ooc_name()),
        );
        server.add_to_buffer(client, "CMD", "Set the area to spectatable.", false);
    } else {
        if area.lock_state() == LockState::Locked {
            server.server_message(client, "This area is already locked.");
            return;
        }
        if area_idx == 0 {
            server.server_message(client, "You cannot lock area 0.");
            return;
        }
        area.set_lock(LockState::Locked);
        server.send_area_server_message(
            area_idx,
            &format!("{} locked the area.", client.ooc_name()),
        );
        server.add_to_buffer(client, "CMD", "Locked the area.", false);
    }
    // Everyone already present is grandfathered in.
    for c in server.clients_snapshot() {
        if c.uid() != -1 && c.area_index() == area_idx {
            area.add_invited(c.uid());
        }
    }
    server.send_lock_arup();
}

fn cmd_log(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let Ok(wanted) = args[0].parse::<usize>() else {
        server.server_message(client, "Invalid area.");
        return;
    };
    match server.areas.get(wanted) {
        Some(area) => server.server_message(client, &area.buffer().join("\n")),
        None => server.server_message(client, "Invalid area."),
    }
}

fn cmd_login(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    if client.authenticated() {
        server.server_message(client, "You are already logged in.");
        return;
    }
    server.add_to_buffer(
        client,
        "AUTH",
        &format!("Attempted login as {}.", args[0]),
        true,
    );
    let (ok, perms) = server.db.authenticate(&args[0], args[1].as_bytes());
    if !ok {
        client.send_packet("AUTH", &["0"]);
        server.add_to_buffer(client, "AUTH", &format!("Failed login as {}.", args[0]), true);
        return;
    }
    {
        let mut st = client.lock();
        st.authenticated = true;
        st.perms = perms;
        st.mod_name = args[0].clone();
    }
    server.server_message(client, "Logged in as moderator.");
    client.send_packet("AUTH", &["1"]);
    server.server_message(client, &format!("Welcome, {}.", args[0]));
    server.add_to_buffer(client, "AUTH", &format!("Logged in as {}.", args[0]), true);
}

fn cmd_logout(server: &Arc<Server>, client: &Arc<Client>) {
    if !client.authenticated() {
        server.server_message(client, "You are not logged in.");
        return;
    }
    server.add_to_buffer(
        client,
        "AUTH",
        &format!("Logged out as {}.", client.mod_name()),
        true,
    );
    client.remove_auth();
    server.server_message(client, "Logged out.");
}

fn cmd_mkusr(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    if server.db.user_exists(&args[0]) {
        server.server_message(client, "User already exists.");
        return;
    }
    let Some(role) = server.role(&args[2]) else {
        server.server_message(client, "Invalid role.");
        return;
    };
    if let Err(e) = server
        .db
        .create_user(&args[0], args[1].as_bytes(), role.permissions)
    {
        error!(err = %e, "failed to create user");
        server.server_message(client, "Invalid username/password.");
        return;
    }
    server.server_message(client, "User created.");
    server.add_to_buffer(client, "CMD", &format!("Created user {}.", args[0]), true);
}

fn cmd_mod(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new().boolean("g").parse(args);
    if flags.rest().is_empty() {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    }
    let msg = flags.rest().join(" ");
    if flags.has("g") {
        server.write_to_all(
            "CT",
            &[&format!("[MOD] [GLOBAL] {}", client.ooc_name()), &msg, "1"],
        );
    } else {
        server.write_to_area(
            client.area_index(),
            "CT",
            &[&format!("[MOD] {}", client.ooc_name()), &msg, "1"],
        );
    }
    server.add_to_buffer(client, "OOC", &msg, false);
}

fn cmd_modchat(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let msg = args.join(" ");
    for c in server.clients_snapshot() {
        if c.has_permission(permissions::MOD_CHAT) {
            c.send_packet(
                "CT",
                &[&format!("[MODCHAT] {}", client.ooc_name()), &msg, "1"],
            );
        }
    }
}

fn cmd_motd(server: &Arc<Server>, client: &Arc<Client>) {
    server.server_message(client, &server.config.motd);
}

fn cmd_move(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new().list_flag("u").parse(args);
    if flags.rest().is_empty() {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return;
    }
    let Ok(area_id) = flags.rest()[0].parse::<usize>() else {
        server.server_message(client, "Invalid area.");
        return;
    };
    if area_id >= server.areas.len() {
        server.server_message(client, "Invalid area.");
        return;
    }

    if !flags.list("u").is_empty() {
        if !client.has_permission(permissions::MOVE_USERS) {
            server.server_message(client, "You do not have permission to use that command.");
            return;
        }
        let targets = get_uid_list(server, flags.list("u"));
        let mut moved = Vec::new();
        for c in &targets {
            if server.change_area(c, area_id).is_err() {
                continue;
            }
            server.server_message(
                c,
                &format!("You were moved to {}.", server.areas[area_id].name()),
            );
            moved.push(c.uid());
        }
        server.server_message(client, &format!("Moved {} users.", moved.len()));
        server.add_to_buffer(
            client,
            "CMD",
            &format!(
                "Moved {} to {}.",
                uid_report(&moved),
                server.areas[area_id].name()
            ),
            false,
        );
    } else {
        match server.change_area(client, area_id) {
            Ok(()) => server.server_message(
                client,
                &format!("Moved to {}.", server.areas[area_id].name()),
            ),
            Err("not invited") => {
                server.server_message(client, "You are not invited to that area.");
            }
            Err(_) => server.server_message(client, "Invalid area."),
        }
    }
}

fn mute_targets(
    server: &Arc<Server>,
    client: &Arc<Client>,
    args: &[String],
    usage: &str,
    kind: Mute,
    base_msg: &str,
    skip: impl Fn(&Client) -> bool,
) -> Option<Vec<i32>> {
    let flags = Flags::new()
        .boolean("ic")
        .boolean("ooc")
        .boolean("m")
        .boolean("j")
        .value("d")
        .value("r")
        .parse(args);
    if flags.rest().is_empty() {
        server.server_message(client, &format!("Not enough arguments:\n{usage}"));
        return None;
    }

    let duration: i64 = flags.get("d").and_then(|d| d.parse().ok()).unwrap_or(-1);
    let mut msg = base_msg.to_string();
    if duration != -1 {
        msg.push_str(&format!(" for {duration} seconds"));
    }
    if let Some(r) = flags.get("r") {
        msg.push_str(&format!(" for reason: {r}"));
    }

    let until = if duration == -1 {
        None
    } else {
        Some(Instant::now() + Duration::from_secs(duration.max(0) as u64))
    };

    let targets = get_uid_list(server, &split_csv(&flags.rest()[0]));
    let mut affected = Vec::new();
    for c in &targets {
        if skip(c) {
            continue;
        }
        c.set_mute(kind, until);
        server.server_message(c, &msg);
        affected.push(c.uid());
    }
    Some(affected)
}

fn cmd_mute(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let flags = Flags::new()
        .boolean("ic")
        .boolean("ooc")
        .boolean("m")
        .boolean("j")
        .value("d")
        .value("r")
        .parse(args);
    let kind = match (flags.has("ic"), flags.has("ooc"), flags.has("m"), flags.has("j")) {
        (true, true, _, _) => Mute::IcOoc,
        (true, _, _, _) => Mute::Ic,
        (_, true, _, _) => Mute::Ooc,
        (_, _, true, _) => Mute::Music,
        (_, _, _, true) => Mute::Judge,
        _ => Mute::Ic,
    };
    let base = format!("You have been muted from {}", kind.as_str());
    let Some(muted) = mute_targets(server, client, args, usage, kind, &base, |c| {
        c.checked_mute() == kind
    }) else {
        return;
    };
    server.server_message(client, &format!("Muted {} clients.", muted.len()));
    server.add_to_buffer(client, "CMD", &format!("Muted {}.", uid_report(&muted)), false);
}

fn cmd_parrot(server: &Arc<Server>, client: &Arc<Client>, args: &[String], usage: &str) {
    let Some(parroted) = mute_targets(
        server,
        client,
        args,
        usage,
        Mute::Parrot,
        "You have been turned into a parrot",
        |c| c.checked_mute() != Mute::Unmuted,
    ) else {
        return;
    };
    server.server_message(client, &format!("Parroted {} clients.", parroted.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Parroted {}.", uid_report(&parroted)),
        false,
    );
}

fn cmd_narrator(server: &Arc<Server>, client: &Arc<Client>) {
    let enabled = {
        let mut st = client.lock();
        st.narrator = !st.narrator;
        st.narrator
    };
    server.server_message(
        client,
        if enabled {
            "Narrator mode enabled."
        } else {
            "Narrator mode disabled."
        },
    );
}

fn cmd_play(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_change_music(area) {
        server.server_message(client, "You are not allowed to change the music in this area.");
        return;
    }
    let song = args.join(" ");
    let showname = {
        let st = client.lock();
        if st.showname.is_empty() {
            drop(st);
            server.current_character(client)
        } else {
            st.showname.clone()
        }
    };
    server.write_to_area(
        area_idx,
        "MC",
        &[&song, &client.char_id().to_string(), &showname, "1", "0"],
    );
    server.add_to_buffer(client, "MUSIC", &format!("Played song {song}."), false);
}

fn cmd_players(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let flags = Flags::new().boolean("a").parse(args);
    let auth = client.authenticated();
    let entry = |c: &Arc<Client>| {
        let mut s = format!("[{}] {}\n", c.uid(), server.current_character(c));
        if auth {
            if c.authenticated() {
                s.push_str(&format!("Mod: {}\n", c.mod_name()));
            }
            s.push_str(&format!("IPID: {}\n", c.ipid));
        }
        let ooc = c.ooc_name();
        if !ooc.is_empty() {
            s.push_str(&format!("OOC: {ooc}\n"));
        }
        s
    };

    let snapshot = server.clients_snapshot();
    let mut out = "\nPlayers\n----------\n".to_string();
    if flags.has("a") {
        for (i, a) in server.areas.iter().enumerate() {
            out.push_str(&format!("{}:\n{} players online.\n", a.name(), a.player_count()));
            for c in &snapshot {
                if c.uid() != -1 && c.area_index() == i {
                    out.push_str(&entry(c));
                }
            }
            out.push_str("----------\n");
        }
    } else {
        let idx = client.area_index();
        let a = &server.areas[idx];
        out.push_str(&format!("{}:\n{} players online.\n", a.name(), a.player_count()));
        for c in &snapshot {
            if c.uid() != -1 && c.area_index() == idx {
                out.push_str(&entry(c));
            }
        }
    }
    server.server_message(client, &out);
}

fn cmd_pm(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let msg = args[1..].join(" ");
    let targets = get_uid_list(server, &split_csv(&args[0]));
    for c in &targets {
        c.send_packet("CT", &[&format!("[PM] {}", client.ooc_name()), &msg, "1"]);
    }
}

fn cmd_rmusr(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    if !server.db.user_exists(&args[0]) {
        server.server_message(client, "User does not exist.");
        return;
    }
    if let Err(e) = server.db.remove_user(&args[0]) {
        error!(err = %e, "failed to remove user");
        server.server_message(client, "Failed to remove user.");
        return;
    }
    server.server_message(client, "Removed user.");

    // A removed user's live sessions lose moderator status immediately.
    for c in server.clients_snapshot() {
        if c.authenticated() && c.mod_name() == args[0] {
            c.remove_auth();
            server.server_message(&c, "Your moderator account was removed.");
        }
    }
    server.add_to_buffer(client, "CMD", &format!("Removed user {}.", args[0]), true);
}

fn cmd_roll(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let flags = Flags::new().boolean("p").parse(args);
    let Some(dice) = flags.rest().first() else {
        server.server_message(client, "Argument not recognized.");
        return;
    };
    let Some((num_s, sides_s)) = dice.split_once('d') else {
        server.server_message(client, "Argument not recognized.");
        return;
    };
    let (Ok(num), Ok(sides)) = (num_s.parse::<u32>(), sides_s.parse::<u32>()) else {
        server.server_message(client, "Argument not recognized.");
        return;
    };
    if num == 0 || num > server.config.max_dice || sides == 0 || sides > server.config.max_sides {
        server.server_message(client, "Invalid num/side.");
        return;
    }
    let mut rng = rand::thread_rng();
    let results: Vec<String> = (0..num)
        .map(|_| rng.gen_range(1..=sides).to_string())
        .collect();
    if flags.has("p") {
        server.server_message(client, &format!("Results: {}.", results.join(", ")));
    } else {
        server.send_area_server_message(
            client.area_index(),
            &format!(
                "{} rolled {}. Results: {}.",
                client.ooc_name(),
                dice,
                results.join(", ")
            ),
        );
    }
    server.add_to_buffer(client, "CMD", &format!("Rolled {dice}."), false);
}

fn cmd_setrole(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let Some(role) = server.role(&args[1]) else {
        server.server_message(client, "Invalid role.");
        return;
    };
    if !server.db.user_exists(&args[0]) {
        server.server_message(client, "User does not exist.");
        return;
    }
    if let Err(e) = server.db.change_permissions(&args[0], role.permissions) {
        error!(err = %e, "failed to change permissions");
        server.server_message(client, "Failed to change permissions.");
        return;
    }
    server.server_message(client, "Role updated.");

    // A re-roled session must prove itself again.
    for c in server.clients_snapshot() {
        if c.authenticated() && c.mod_name() == args[0] {
            c.remove_auth();
            server.server_message(&c, "Your role changed; please log in again.");
        }
    }
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Updated role of {} to {}.", args[0], args[1]),
        true,
    );
}

fn cmd_status(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let Some(status) = Status::parse(&args[0]) else {
        server.server_message(
            client,
            "Status not recognized. Recognized statuses: idle, looking-for-players, casing, recess, rp, gaming",
        );
        return;
    };
    let area_idx = client.area_index();
    server.areas[area_idx].set_status(status);
    server.send_area_server_message(
        area_idx,
        &format!("{} set the status to {}.", client.ooc_name(), args[0]),
    );
    server.send_status_arup();
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Set the status to {}.", args[0]),
        false,
    );
}

fn cmd_swapevi(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if !client.can_alter_evidence(area) {
        server.server_message(client, "You are not allowed to alter evidence in this area.");
        return;
    }
    let (Ok(a), Ok(b)) = (args[0].parse::<usize>(), args[1].parse::<usize>()) else {
        return;
    };
    if area.swap_evidence(a, b) {
        server.server_message(client, "Evidence swapped.");
        broadcast_evidence(server, area_idx);
        server.add_to_buffer(
            client,
            "CMD",
            &format!("Swapped positions of evidence {a} and {b}."),
            false,
        );
    } else {
        server.server_message(client, "Invalid arguments.");
    }
}

fn cmd_testimony(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];

    if args.is_empty() {
        let st = area.lock();
        if st.testimony.is_empty() {
            drop(st);
            server.server_message(client, "This area has no recorded testimony.");
            return;
        }
        let text = st.testimony.statements().join("\n");
        drop(st);
        server.server_message(client, &text);
        return;
    }
    if !client.has_cm_permission(area) {
        server.server_message(client, "You do not have permission to use that command.");
        return;
    }

    match args[0].as_str() {
        "record" => {
            {
                let mut st = area.lock();
                if st.testimony.state != RecorderState::Idle {
                    drop(st);
                    server.server_message(client, "The recorder is currently active.");
                    return;
                }
                st.testimony.clear();
                st.testimony.state = RecorderState::Recording;
            }
            server.server_message(client, "Recording testimony.");
        }
        "stop" => {
            {
                let mut st = area.lock();
                st.testimony.state = RecorderState::Idle;
                st.testimony.jump(0);
            }
            server.server_message(client, "Recorder stopped.");
            server.write_to_area(area_idx, "RT", &["testimony1", "1"]);
        }
        "play" => {
            let stmt = {
                let mut st = area.lock();
                if st.testimony.len() < 2 {
                    None
                } else {
                    st.testimony.state = RecorderState::Playback;
                    st.testimony.jump(1);
                    st.testimony.current().map(str::to_string)
                }
            };
            let Some(stmt) = stmt else {
                server.server_message(client, "No testimony recorded.");
                return;
            };
            server.server_message(client, "Playing testimony.");
            server.write_to_area(area_idx, "RT", &["testimony2"]);
            server.write_raw_to_area(area_idx, &format!("MS#{stmt}#%"));
        }
        "update" => {
            let mut st = area.lock();
            if st.testimony.state != RecorderState::Playback {
                drop(st);
                server.server_message(client, "The recorder is not active.");
                return;
            }
            st.testimony.state = RecorderState::Updating;
        }
        "insert" => {
            let mut st = area.lock();
            if st.testimony.state != RecorderState::Playback {
                drop(st);
                server.server_message(client, "The recorder is not active.");
                return;
            }
            st.testimony.state = RecorderState::Inserting;
        }
        "delete" => {
            let removed = {
                let mut st = area.lock();
                if st.testimony.state != RecorderState::Playback {
                    drop(st);
                    server.server_message(client, "The recorder is not active.");
                    return;
                }
                st.testimony.index() > 0 && st.testimony.remove()
            };
            if !removed {
                server.server_message(client, "Failed to delete statement.");
            }
        }
        _ => {
            server.server_message(client, "Argument not recognized.");
        }
    }
}

fn cmd_unban(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let mut nullified = Vec::new();
    for s in split_csv(&args[0]) {
        let Ok(id) = s.parse::<i64>() else {
            continue;
        };
        if server.db.unban(id).is_err() {
            continue;
        }
        nullified.push(s);
    }
    let report = nullified.join(", ");
    server.server_message(client, &format!("Nullified bans: {report}"));
    server.add_to_buffer(client, "CMD", &format!("Nullified bans: {report}"), true);
}

fn cmd_uncm(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if args.is_empty() {
        if !area.has_cm(client.uid()) {
            server.server_message(client, "You are not a CM in this area.");
            return;
        }
        area.remove_cm(client.uid());
        server.server_message(client, "You are no longer a CM in this area.");
        server.add_to_buffer(client, "CMD", "Un-CMed self.", false);
    } else {
        let targets = get_uid_list(server, &split_csv(&args[0]));
        let mut demoted = Vec::new();
        for c in &targets {
            if c.area_index() != area_idx || !area.has_cm(c.uid()) {
                continue;
            }
            area.remove_cm(c.uid());
            server.server_message(c, "You are no longer a CM in this area.");
            demoted.push(c.uid());
        }
        server.server_message(client, &format!("Un-CMed {} users.", demoted.len()));
        server.add_to_buffer(
            client,
            "CMD",
            &format!("Un-CMed {}.", uid_report(&demoted)),
            false,
        );
    }
    server.send_cm_arup();
}

fn cmd_uninvite(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if area.lock_state() == LockState::Free {
        server.server_message(client, "This area is unlocked.");
        return;
    }
    let targets = get_uid_list(server, &split_csv(&args[0]));
    let mut uninvited = Vec::new();
    for c in &targets {
        // CMs keep their standing invitation.
        if Arc::ptr_eq(c, client) || area.has_cm(c.uid()) {
            continue;
        }
        if !area.remove_invited(c.uid()) {
            continue;
        }
        if c.area_index() == area_idx
            && area.lock_state() == LockState::Locked
            && !c.has_permission(permissions::BYPASS_LOCK)
        {
            server.server_message(c, "You were kicked from the area!");
            let _ = server.change_area(c, 0);
        }
        server.server_message(c, &format!("You were uninvited from area {}.", area.name()));
        uninvited.push(c.uid());
    }
    server.server_message(client, &format!("Uninvited {} users.", uninvited.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Uninvited {} from the area.", uid_report(&uninvited)),
        false,
    );
}

fn cmd_unlock(server: &Arc<Server>, client: &Arc<Client>) {
    let area_idx = client.area_index();
    let area = &server.areas[area_idx];
    if area.lock_state() == LockState::Free {
        server.server_message(client, "This area is not locked.");
        return;
    }
    area.set_lock(LockState::Free);
    area.clear_invited();
    server.send_lock_arup();
    server.send_area_server_message(
        area_idx,
        &format!("{} unlocked the area.", client.ooc_name()),
    );
    server.add_to_buffer(client, "CMD", "Unlocked the area.", false);
}

fn cmd_unmute(server: &Arc<Server>, client: &Arc<Client>, args: &[String]) {
    let targets = get_uid_list(server, &split_csv(&args[0]));
    let mut unmuted = Vec::new();
    for c in &targets {
        if c.checked_mute() == Mute::Unmuted {
            continue;
        }
        c.set_mute(Mute::Unmuted, None);
        server.server_message(c, "You have been unmuted.");
        unmuted.push(c.uid());
    }
    server.server_message(client, &format!("Unmuted {} clients.", unmuted.len()));
    server.add_to_buffer(
        client,
        "CMD",
        &format!("Unmuted {}.", uid_report(&unmuted)),
        false,
    );
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_forms() {
        assert_eq!(parse_duration("90"), Some(90));
        assert_eq!(parse_duration("90s"), Some(90));
        assert_eq!(parse_duration("3d"), Some(3 * 24 * 3600));
        assert_eq!(parse_duration("1h30m"), Some(5400));
        assert_eq!(parse_duration("2d12h"), Some(2 * 24 * 3600 + 12 * 3600));
        assert_eq!(parse_duration("perma"), None);
        assert_eq!(parse_duration("3x"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("d"), None);
    }

    #[test]
    fn command_table_is_sorted_and_unique() {
        let names: Vec<_> = COMMANDS.iter().map(|c| c.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted, "command table must stay sorted and unique");
    }

    #[test]
    fn find_resolves_known_commands_only() {
        assert!(find("ban").is_some());
        assert!(find("testimony").is_some());
        assert!(find("frobnicate").is_none());
    }

    #[test]
    fn csv_targets_are_trimmed() {
        assert_eq!(split_csv("1, 2,,3"), vec!["1", "2", "3"]);
        assert!(split_csv("").is_empty());
    }
}
