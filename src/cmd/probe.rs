use std::sync::Arc;

use crate::{probe::ResultStore, ProbeSettings, Prober, Status};

/// Configures every prober against the global settings.
///
/// A prober that fails is kept, marked Bad with the reason, and left out of
/// the returned valid list. Valid probers take over the statistics saved
/// under their name.
pub fn config_probers(
    probers: Vec<Box<dyn Prober>>,
    settings: &ProbeSettings,
    store: &ResultStore,
) -> (Vec<Arc<dyn Prober>>, Vec<Arc<dyn Prober>>) {
    let mut all: Vec<Arc<dyn Prober>> = Vec::with_capacity(probers.len());
    let mut valid: Vec<Arc<dyn Prober>> = vec![];

    for mut p in probers {
        if let Err(err) = p.config(settings) {
            p.result().mark_bad(format!("Bad Configuration: {}", err));
            log::error!(
                "Bad Probe Configuration for prober {} {}: {}",
                p.kind(),
                p.name(),
                err,
            );
            all.push(Arc::from(p));
            continue;
        }

        if valid.iter().any(|v| v.name() == p.name()) {
            log::warn!(
                "Prober [{} - {}] name is duplicated, the later one is still scheduled",
                p.kind(),
                p.name()
            );
        }

        if let Some(saved) = store.get(p.name()) {
            p.result().update(|r| r.restore(&saved));
            log::debug!("[{} / {}] statistics restored", p.kind(), p.name());
        }

        let p: Arc<dyn Prober> = Arc::from(p);
        valid.push(Arc::clone(&p));
        all.push(p);
    }

    (all, valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{new_dummy_prober, DummyBehavior};
    use crate::ProbeResult;

    fn boxed(name: &str, bad: bool) -> Box<dyn Prober> {
        Box::new(new_dummy_prober(
            name,
            DummyBehavior {
                bad_config: bad,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_config_probers() {
        let store = ResultStore::new();
        let mut saved = ProbeResult {
            name: "good".to_string(),
            status: Status::Down,
            ..Default::default()
        };
        saved.stat.total = 42;
        store.set(saved);

        let (all, valid) = config_probers(
            vec![boxed("good", false), boxed("broken", true), boxed("other", false)],
            &ProbeSettings::default(),
            &store,
        );

        assert_eq!(all.len(), 3);
        let names: Vec<_> = valid.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["good", "other"]);

        let broken = all[1].result().snapshot();
        assert_eq!(broken.status, Status::Bad);
        assert_eq!(broken.message, "Bad Configuration: malformed address");

        let good = valid[0].result().snapshot();
        assert_eq!(good.stat.total, 42);
        assert_eq!(good.status, Status::Down);
        assert_eq!(valid[1].result().snapshot().stat.total, 0);
    }
}
