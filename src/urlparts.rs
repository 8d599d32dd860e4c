use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+\-.]*):").unwrap());

/// A URL split into its generic components. Splitting never fails: text
/// that isn't a URL ends up in `path`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportUrl {
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
    // `//` was present, even if the authority is empty
    has_authority: bool,
}

/// The parts a URL symptom may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPart {
    Scheme,
    Netloc,
    Path,
    Params,
    Query,
    Fragment,
    Username,
    Password,
    Hostname,
    Port,
}

impl UrlPart {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "scheme" => UrlPart::Scheme,
            "netloc" => UrlPart::Netloc,
            "path" => UrlPart::Path,
            "params" => UrlPart::Params,
            "query" => UrlPart::Query,
            "fragment" => UrlPart::Fragment,
            "username" => UrlPart::Username,
            "password" => UrlPart::Password,
            "hostname" => UrlPart::Hostname,
            "port" => UrlPart::Port,
            _ => return None,
        })
    }
}

impl ReportUrl {
    pub fn parse(input: &str) -> Self {
        let mut rest = input.trim();
        let mut scheme = String::new();
        if let Some(caps) = RE_SCHEME.captures(rest) {
            scheme = caps[1].to_ascii_lowercase();
            rest = &rest[caps[0].len()..];
        }

        let mut netloc = String::new();
        let has_authority = rest.starts_with("//");
        if has_authority {
            let after = &rest[2..];
            let end = after.find(&['/', '?', '#'][..]).unwrap_or(after.len());
            netloc = after[..end].to_string();
            rest = &after[end..];
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r, f.to_string()),
            None => (rest, String::new()),
        };
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (rest.to_string(), String::new()),
        };

        Self { scheme, netloc, path, query, fragment, has_authority }
    }

    // `;params` trailing the last path segment
    fn split_params(&self) -> (&str, Option<&str>) {
        let last = self.path.rfind('/').map_or(0, |i| i + 1);
        match self.path[last..].find(';') {
            Some(idx) => (&self.path[..last + idx], Some(&self.path[last + idx + 1..])),
            None => (&self.path, None),
        }
    }

    /// Parameters of the last path segment, empty when there are none.
    pub fn params(&self) -> &str {
        self.split_params().1.unwrap_or("")
    }

    fn userinfo(&self) -> Option<&str> {
        self.netloc.rsplit_once('@').map(|(u, _)| u)
    }

    fn hostinfo(&self) -> &str {
        match self.netloc.rsplit_once('@') {
            Some((_, h)) => h,
            None => &self.netloc,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.userinfo().map(|u| u.split_once(':').map(|(n, _)| n).unwrap_or(u))
    }

    pub fn password(&self) -> Option<&str> {
        self.userinfo().and_then(|u| u.split_once(':').map(|(_, p)| p))
    }

    pub fn hostname(&self) -> Option<String> {
        let host = self.hostinfo();
        let name = if let Some(bracketed) = host.strip_prefix('[') {
            bracketed.split(']').next().unwrap_or("")
        } else {
            host.split(':').next().unwrap_or("")
        };
        if name.is_empty() {
            None
        } else {
            Some(name.to_ascii_lowercase())
        }
    }

    pub fn port(&self) -> Option<u16> {
        let host = self.hostinfo();
        let after_host = match host.rfind(']') {
            Some(idx) => &host[idx + 1..],
            None => host,
        };
        let (_, port) = after_host.rsplit_once(':')?;
        port.parse().ok()
    }

    /// Value of one component as matched by URL symptoms. Optional
    /// components that are missing come back as `None`.
    pub fn part(&self, part: UrlPart) -> Option<String> {
        match part {
            UrlPart::Scheme => Some(self.scheme.clone()),
            UrlPart::Netloc => Some(self.netloc.clone()),
            UrlPart::Path => Some(self.split_params().0.to_string()),
            UrlPart::Params => Some(self.params().to_string()),
            UrlPart::Query => Some(self.query.clone()),
            UrlPart::Fragment => Some(self.fragment.clone()),
            UrlPart::Username => self.username().map(str::to_string),
            UrlPart::Password => self.password().map(str::to_string),
            UrlPart::Hostname => self.hostname(),
            UrlPart::Port => self.port().map(|p| p.to_string()),
        }
    }
}

impl fmt::Display for ReportUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if self.has_authority || !self.netloc.is_empty() {
            write!(f, "//{}", self.netloc)?;
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}
