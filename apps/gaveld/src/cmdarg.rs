//! Short-flag parsing for OOC commands: `-b`, `-d value`, `-d=value`, and
//! comma-separated list flags like `-u 1,2,3`. Parsing stops at the first
//! token that is not a registered flag; everything from there is positional.

use std::collections::HashMap;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Flags {
    bool_names: Vec<&'static str>,
    value_names: Vec<&'static str>,
    list_names: Vec<&'static str>,
    bools: HashSet<&'static str>,
    values: HashMap<&'static str, String>,
    lists: HashMap<&'static str, Vec<String>>,
    rest: Vec<String>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boolean(mut self, name: &'static str) -> Self {
        self.bool_names.push(name);
        self
    }

    pub fn value(mut self, name: &'static str) -> Self {
        self.value_names.push(name);
        self
    }

    pub fn list_flag(mut self, name: &'static str) -> Self {
        self.list_names.push(name);
        self
    }

    pub fn parse(mut self, args: &[String]) -> Self {
        let mut i = 0;
        while i < args.len() {
            let Some(flag) = args[i].strip_prefix('-') else {
                break;
            };
            let (name, inline) = match flag.split_once('=') {
                Some((n, v)) => (n, Some(v.to_string())),
                None => (flag, None),
            };

            if let Some(&n) = self.bool_names.iter().find(|b| **b == name) {
                if inline.is_some() {
                    break;
                }
                self.bools.insert(n);
                i += 1;
            } else if let Some(&n) = self.value_names.iter().find(|v| **v == name) {
                let value = match inline {
                    Some(v) => v,
                    None => {
                        i += 1;
                        match args.get(i) {
                            Some(v) => v.clone(),
                            None => break,
                        }
                    }
                };
                self.values.insert(n, value);
                i += 1;
            } else if let Some(&n) = self.list_names.iter().find(|l| **l == name) {
                let raw = match inline {
                    Some(v) => v,
                    None => {
                        i += 1;
                        match args.get(i) {
                            Some(v) => v.clone(),
                            None => break,
                        }
                    }
                };
                let items = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                self.lists.insert(n, items);
                i += 1;
            } else {
                // Unknown flag: treat it and the remainder as positionals.
                break;
            }
        }
        self.rest = args[i..].iter().filter(|a| !a.is_empty()).cloned().collect();
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.bools.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn list(&self, name: &str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rest(&self) -> &[String] {
        &self.rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_mixed_flags_and_positionals() {
        let f = Flags::new()
            .list_flag("u")
            .value("d")
            .parse(&to_args(&["-u", "1,2,3", "-d", "3d", "being", "rude"]));
        assert_eq!(f.list("u"), &["1", "2", "3"]);
        assert_eq!(f.get("d"), Some("3d"));
        assert_eq!(f.rest(), &["being", "rude"]);
    }

    #[test]
    fn boolean_flags_and_equals_form() {
        let f = Flags::new()
            .boolean("ic")
            .boolean("ooc")
            .value("r")
            .parse(&to_args(&["-ic", "-r=spam", "5"]));
        assert!(f.has("ic"));
        assert!(!f.has("ooc"));
        assert_eq!(f.get("r"), Some("spam"));
        assert_eq!(f.rest(), &["5"]);
    }

    #[test]
    fn stops_at_first_positional() {
        let f = Flags::new()
            .boolean("p")
            .parse(&to_args(&["2d6", "-p"]));
        assert!(!f.has("p"));
        assert_eq!(f.rest(), &["2d6", "-p"]);
    }

    #[test]
    fn unknown_flag_becomes_positional() {
        let f = Flags::new().boolean("s").parse(&to_args(&["-x", "y"]));
        assert!(!f.has("s"));
        assert_eq!(f.rest(), &["-x", "y"]);
    }

    #[test]
    fn trailing_value_flag_without_value() {
        let f = Flags::new().value("d").parse(&to_args(&["-d"]));
        assert_eq!(f.get("d"), None);
        assert!(f.rest().is_empty());
    }
}
