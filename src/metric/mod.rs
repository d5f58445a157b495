//! Prometheus plumbing shared by the probers and the configuration loader.
//!
//! Gauges are cached by their fully qualified name so that creating the same
//! metric twice (e.g. after an in-process reload) returns the registered one
//! instead of failing on a duplicate registration.

use std::{collections::HashMap, sync::LazyLock};

use anyhow::Result;
use parking_lot::Mutex;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static GAUGES: LazyLock<Mutex<HashMap<String, GaugeVec>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Lower-cases the name and replaces every character prometheus rejects.
pub fn sanitize(name: &str) -> String {
    let s: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match s.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", s),
        _ => s,
    }
}

fn full_name(namespace: &str, subsystem: &str, name: &str, metric: &str) -> String {
    [namespace, subsystem, name, metric]
        .iter()
        .map(|p| sanitize(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Returns the gauge `namespace_subsystem_name_metric`, creating it on first use.
pub fn new_gauge(
    namespace: &str,
    subsystem: &str,
    name: &str,
    metric: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec> {
    let key = full_name(namespace, subsystem, name, metric);

    let mut gauges = GAUGES.lock();
    if let Some(g) = gauges.get(&key) {
        return Ok(g.clone());
    }

    let gauge = GaugeVec::new(Opts::new(key.clone(), help), labels)?;
    REGISTRY.register(Box::new(gauge.clone()))?;
    gauges.insert(key, gauge.clone());
    Ok(gauge)
}

/// Renders every registered metric in the text exposition format.
pub fn encode() -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
