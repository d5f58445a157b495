use std::sync::Arc;

use crate::{Notifier, NotifierSetting};

/// Configures the notifiers; the ones that fail are dropped.
pub fn config_notifiers(
    notifiers: Vec<Box<dyn Notifier>>,
    setting: &NotifierSetting,
) -> Vec<Arc<dyn Notifier>> {
    let mut valid: Vec<Arc<dyn Notifier>> = vec![];
    for mut n in notifiers {
        if let Err(err) = n.config(setting) {
            log::error!(
                "Bad Notify Configuration for notifier {} {}: {}",
                n.kind(),
                n.name(),
                err
            );
            continue;
        }
        valid.push(Arc::from(n));
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    #[test]
    fn test_config_notifiers() {
        let dir = tempfile::tempdir().unwrap();
        let good = LogNotifier::new("good", dir.path().join("n.log").to_str().unwrap());
        let bad = LogNotifier::new("bad", dir.path().join("missing/dir/n.log").to_str().unwrap());

        let valid = config_notifiers(
            vec![Box::new(good), Box::new(bad)],
            &NotifierSetting::default(),
        );
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name(), "good");
        assert_eq!(valid[0].channels(), &[crate::DEFAULT_CHANNEL_NAME.to_string()]);
    }
}
