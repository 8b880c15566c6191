//! Native template syntax: literal text with `{{ .Name }}` field actions.

use crate::error_handling::types::TemplateError;

/// Values a template may reference. The set of names is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub smb_server: String,
    pub local_ip: String,
    pub local_port: String,
    pub session_usn: String,
    pub redirect_url: String,
}

impl TemplateVars {
    pub fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "SMBServer" => Some(&self.smb_server),
            "LocalIP" => Some(&self.local_ip),
            "LocalPort" => Some(&self.local_port),
            "SessionUSN" => Some(&self.session_usn),
            "RedirectURL" => Some(&self.redirect_url),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Node<'a> {
    Text(&'a str),
    Field(&'a str),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

fn parse(source: &str) -> Result<Vec<Node<'_>>, TemplateError> {
    let mut nodes = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            nodes.push(Node::Text(&rest[..start]));
        }
        let inner_start = &rest[start + OPEN.len()..];
        let end = inner_start.find(CLOSE).ok_or_else(|| {
            TemplateError::Malformed(format!(
                "unclosed action at byte {}",
                source.len() - rest.len() + start
            ))
        })?;

        let action = inner_start[..end].trim();
        let field = action
            .strip_prefix('.')
            .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .ok_or_else(|| TemplateError::Malformed(format!("unsupported action {{{{{}}}}}", action)))?;
        nodes.push(Node::Field(field));

        rest = &inner_start[end + CLOSE.len()..];
    }
    if !rest.is_empty() {
        nodes.push(Node::Text(rest));
    }
    Ok(nodes)
}

/// Parses `source` and executes it against `vars`.
pub fn execute(source: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let nodes = parse(source)?;
    let mut out = String::with_capacity(source.len());
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(name) => {
                let value = vars
                    .lookup(name)
                    .ok_or_else(|| TemplateError::Malformed(format!("unknown field .{}", name)))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
