//! Conversion from operator placeholder syntax (`$local_ip`) to the engine's
//! native action syntax (`{{.LocalIP}}`).
//!
//! Campaign files are written with `$name` placeholders and `$$` for a literal
//! dollar sign. This pass rewrites them in a single left-to-right scan so an
//! escaped `$$local_ip` stays the literal text `$local_ip`.

/// Operator placeholder (without the leading `$`) and the variable it maps to.
const PLACEHOLDERS: &[(&str, &str)] = &[
    ("SMB_SERVER", "SMBServer"),
    ("smb_server", "SMBServer"),
    ("local_ip", "LocalIP"),
    ("local_port", "LocalPort"),
    ("session_usn", "SessionUSN"),
    ("redirect_url", "RedirectURL"),
];

pub fn convert(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        match PLACEHOLDERS
            .iter()
            .find(|(token, _)| after.starts_with(token))
        {
            Some((token, var)) => {
                out.push_str("{{.");
                out.push_str(var);
                out.push_str("}}");
                rest = &after[token.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
