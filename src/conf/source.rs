use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde_yaml::Value;

use super::ConfigMetrics;

/// Where the configuration document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A YAML file, or a directory whose YAML files are merged into one document.
    File(PathBuf),
    /// An `http(s)://` URL returning YAML.
    Url(String),
}

impl ConfigSource {
    pub fn new(path: &str) -> Self {
        let path = path.trim();
        if is_external_url(path) {
            Self::Url(path.to_string())
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    pub fn endpoint(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Url(u) => u.clone(),
        }
    }

    /// Raw bytes of the document, before environment expansion.
    ///
    /// Every attempt updates the availability gauges of this endpoint.
    pub async fn fetch(&self) -> Result<Vec<u8>> {
        let res = match self {
            Self::File(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || read_file_or_dir(&path)).await?
            }
            Self::Url(url) => fetch_url(url).await,
        };
        match ConfigMetrics::new() {
            Ok(m) => m.observe(&self.endpoint(), res.is_ok()),
            Err(err) => log::debug!("config metrics are not available - {}", err),
        }
        res
    }
}

impl Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

pub fn is_external_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(u) => u.scheme().starts_with("http") && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(err) => {
            log::trace!("{} is not an URL - {}", s, err);
            false
        }
    }
}

async fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let mut builder = reqwest::Client::builder();
    if let Ok(t) = std::env::var("HTTP_TIMEOUT") {
        if !t.is_empty() {
            let secs: u64 = t
                .trim()
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT={} is not a number of seconds", t))?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
    }
    let client = builder.build()?;

    let mut request = client.get(url);
    if let Ok(auth) = std::env::var("HTTP_AUTHORIZATION") {
        if !auth.is_empty() {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
    }

    let response = request.send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn read_file_or_dir(path: &Path) -> Result<Vec<u8>> {
    let meta =
        fs::metadata(path).with_context(|| format!("failed to access {}", path.display()))?;
    if meta.is_dir() {
        return merge_yaml_files(path);
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn yaml_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let p = entry?.path();
        if p.is_file() && p.extension().is_some_and(|e| e == ext) {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

/// Merges `*.yaml` then `*.yml` in name order into a single document.
fn merge_yaml_files(dir: &Path) -> Result<Vec<u8>> {
    let mut files = yaml_files(dir, "yaml")?;
    files.extend(yaml_files(dir, "yml")?);
    if files.is_empty() {
        bail!("yaml files not found for {}", dir.display())
    }

    let mut merged = Value::Mapping(Default::default());
    for f in &files {
        let content = fs::read(f).with_context(|| format!("failed to read {}", f.display()))?;
        let v: Value = serde_yaml::from_slice(&content)
            .with_context(|| format!("failed to parse {}", f.display()))?;
        merge_value(&mut merged, v);
    }
    Ok(serde_yaml::to_string(&merged)?.into_bytes())
}

/// Maps merge key by key, sequences are appended, anything else is replaced.
pub fn merge_value(base: &mut Value, other: Value) {
    match (base, other) {
        (Value::Mapping(b), Value::Mapping(o)) => {
            for (k, v) in o {
                match b.get_mut(&k) {
                    Some(existing) => merge_value(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (Value::Sequence(b), Value::Sequence(o)) => b.extend(o),
        (_, Value::Null) => {}
        (b, o) => *b = o,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replaces `${VAR}` and `$VAR` with the environment value, empty when unset.
pub fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        }

        let len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&after[..len]).unwrap_or_default());
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}
