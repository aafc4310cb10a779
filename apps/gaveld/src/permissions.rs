//! Moderator permissions are a 64-bit bitmask; roles are named bundles of
//! permission bits loaded from `roles.toml`.

use crate::config::RoleConfig;

pub const NONE: u64 = 0;
pub const CM: u64 = 1;
pub const KICK: u64 = 1 << 1;
pub const BAN: u64 = 1 << 2;
pub const BYPASS_LOCK: u64 = 1 << 3;
pub const BAN_INFO: u64 = 1 << 4;
pub const MUTE: u64 = 1 << 5;
pub const MOVE_USERS: u64 = 1 << 6;
pub const MOD_CHAT: u64 = 1 << 7;
pub const MOD_SPEAK: u64 = 1 << 8;
pub const MOD_EVI: u64 = 1 << 9;
pub const MODIFY_AREA: u64 = 1 << 10;
pub const LOG: u64 = 1 << 11;
pub const ADMIN: u64 = i64::MAX as u64;

fn bit(name: &str) -> u64 {
    match name {
        "NONE" => NONE,
        "CM" => CM,
        "KICK" => KICK,
        "BAN" => BAN,
        "BYPASS_LOCK" => BYPASS_LOCK,
        "BAN_INFO" => BAN_INFO,
        "MUTE" => MUTE,
        "MOVE_USERS" => MOVE_USERS,
        "MOD_CHAT" => MOD_CHAT,
        "MOD_SPEAK" => MOD_SPEAK,
        "MOD_EVI" => MOD_EVI,
        "MODIFY_AREA" => MODIFY_AREA,
        "LOG" => LOG,
        "ADMIN" => ADMIN,
        _ => NONE,
    }
}

#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub permissions: u64,
}

impl Role {
    pub fn from_config(rc: &RoleConfig) -> Self {
        let permissions = rc.permissions.iter().fold(0, |acc, p| acc | bit(p));
        Self {
            name: rc.name.clone(),
            permissions,
        }
    }
}

/// A required set is satisfied iff every required bit is present.
pub fn has_permission(perms: u64, required: u64) -> bool {
    required == (perms & required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_every_bit() {
        assert!(has_permission(KICK | BAN, KICK));
        assert!(has_permission(KICK | BAN, KICK | BAN));
        assert!(!has_permission(KICK, KICK | BAN));
        assert!(has_permission(0, NONE));
        assert!(has_permission(ADMIN, MODIFY_AREA | LOG | BAN));
    }

    #[test]
    fn role_bits_accumulate() {
        let role = Role::from_config(&RoleConfig {
            name: "mod".to_string(),
            permissions: vec!["KICK".to_string(), "BAN".to_string(), "MUTE".to_string()],
        });
        assert_eq!(role.permissions, KICK | BAN | MUTE);
    }

    #[test]
    fn unknown_bit_names_are_inert() {
        let role = Role::from_config(&RoleConfig {
            name: "odd".to_string(),
            permissions: vec!["KICK".to_string(), "FLY".to_string()],
        });
        assert_eq!(role.permissions, KICK);
    }
}
