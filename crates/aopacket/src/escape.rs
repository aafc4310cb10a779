//! Escapes for the four reserved AO2 metacharacters.
//!
//! `%`, `#`, `$` and `&` are structural on the wire, so user-supplied fields
//! carry them as `<percent>`, `<num>`, `<dollar>` and `<and>`.

const SUBS: [(char, &str); 4] = [
    ('%', "<percent>"),
    ('#', "<num>"),
    ('$', "<dollar>"),
    ('&', "<and>"),
];

/// Replace escape sequences with the characters they stand for.
///
/// All four substitutions are applied in a single left-to-right pass, so a
/// replacement never forms part of a later match.
pub fn decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    'outer: while let Some(i) = rest.find('<') {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        for (ch, token) in SUBS {
            if tail.starts_with(token) {
                out.push(ch);
                rest = &tail[token.len()..];
                continue 'outer;
            }
        }
        out.push('<');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Replace reserved characters with their escape sequences.
pub fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("<percent>"),
            '#' => out.push_str("<num>"),
            '$' => out.push_str("<dollar>"),
            '&' => out.push_str("<and>"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_is_identity_on_reserved_chars() {
        let s = "100% #1 $5 A&B";
        assert_eq!(decode(&encode(s)), s);
    }

    #[test]
    fn decodes_all_tokens() {
        assert_eq!(decode("<percent><num><dollar><and>"), "%#$&");
    }

    #[test]
    fn leaves_unknown_angle_text_alone() {
        assert_eq!(decode("<nope> a < b"), "<nope> a < b");
        assert_eq!(decode("<per<num>cent>"), "<per#cent>");
    }

    #[test]
    fn single_pass_does_not_rescan_output() {
        // The '%' produced by the inner token must not combine with the
        // surrounding text into a second match.
        assert_eq!(decode("<perc<percent>ent>"), "<perc%ent>");
    }

    #[test]
    fn encodes_mixed_text() {
        assert_eq!(encode("evi&name#1"), "evi<and>name<num>1");
    }
}
