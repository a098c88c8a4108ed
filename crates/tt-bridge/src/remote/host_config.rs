//! Minimal reader for OpenSSH client configuration (`~/.ssh/config`).
//!
//! Understands `Host` blocks with `HostName`, `Port`, `User` and
//! `IdentityFile`. `Match` blocks are skipped and `Include` is not
//! followed. As with `ssh` itself, the first value obtained for a keyword
//! wins, across every block whose patterns match.

use std::path::Path;

use tracing::debug;

use tt_api_types::ResolvedHostEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct HostBlock {
    patterns: Vec<String>,
    hostname: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    identity_file: Option<String>,
}

impl HostBlock {
    fn matches(&self, alias: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(negated, alias) {
                    return false;
                }
            } else if glob_match(pattern, alias) {
                matched = true;
            }
        }
        matched
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    pub fn parse(text: &str) -> Self {
        let mut blocks = Vec::new();
        // Settings before the first Host line apply to every host.
        let mut current = Some(HostBlock {
            patterns: vec!["*".to_string()],
            ..Default::default()
        });

        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((keyword, value)) = split_keyword(line) else {
                continue;
            };

            if keyword.eq_ignore_ascii_case("host") {
                blocks.extend(current.take());
                current = Some(HostBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    ..Default::default()
                });
                continue;
            }
            if keyword.eq_ignore_ascii_case("match") {
                blocks.extend(current.take());
                continue;
            }

            let Some(block) = current.as_mut() else {
                continue;
            };
            let value = unquote(value);
            match keyword.to_ascii_lowercase().as_str() {
                "hostname" => {
                    block.hostname.get_or_insert_with(|| value.to_string());
                }
                "port" => {
                    if block.port.is_none() {
                        block.port = value.parse().ok();
                    }
                }
                "user" => {
                    block.user.get_or_insert_with(|| value.to_string());
                }
                "identityfile" => {
                    block.identity_file.get_or_insert_with(|| value.to_string());
                }
                _ => {}
            }
        }
        blocks.extend(current);
        Self { blocks }
    }

    /// Read and parse `path`. A missing or unreadable file yields an empty
    /// configuration.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ssh config not readable");
                Self::default()
            }
        }
    }

    /// Concrete aliases named on `Host` lines, in file order, without
    /// duplicates. Wildcard patterns and negations are left out.
    pub fn aliases(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for block in &self.blocks {
            for pattern in &block.patterns {
                if is_pattern(pattern) || out.iter().any(|a| a == pattern) {
                    continue;
                }
                out.push(pattern.clone());
            }
        }
        out
    }

    /// Effective settings for `alias`, or `None` if no `Host` line names it.
    pub fn resolve(&self, alias: &str) -> Option<ResolvedHostEntry> {
        let alias = alias.trim();
        if alias.is_empty() || !self.aliases().iter().any(|a| a == alias) {
            return None;
        }

        let mut hostname = None;
        let mut port = None;
        let mut user = None;
        let mut identity_file = None;
        for block in self.blocks.iter().filter(|b| b.matches(alias)) {
            hostname = hostname.or_else(|| block.hostname.clone());
            port = port.or(block.port);
            user = user.or_else(|| block.user.clone());
            identity_file = identity_file.or_else(|| block.identity_file.clone());
        }

        Some(ResolvedHostEntry {
            alias: alias.to_string(),
            resolved_host: hostname
                .map(|h| h.replace("%h", alias))
                .unwrap_or_else(|| alias.to_string()),
            resolved_port: port,
            resolved_user: user,
            identity_file: identity_file.map(|p| expand_tilde(&p)),
        })
    }
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(idx);
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=').trim();
    if keyword.is_empty() || value.is_empty() {
        return None;
    }
    Some((keyword, value))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn is_pattern(alias: &str) -> bool {
    alias.starts_with('!') || alias.contains('*') || alias.contains('?')
}

fn expand_tilde(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest).to_string_lossy().into_owned(),
            None => path.to_string(),
        },
        None => path.to_string(),
    }
}

/// `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
