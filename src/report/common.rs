use anyhow::Result;

/// Logs the outcome of one delivery attempt chain.
pub fn log_send(kind: &str, name: &str, tag: &str, title: &str, res: Result<()>) {
    let title = match title.trim() {
        "" => "<untitled>",
        t => t,
    };

    if let Err(err) = res {
        log::error!("[{} / {} / {}] - {} - failed to send: {:#}", kind, name, tag, title, err);
        return;
    }
    log::info!("[{} / {} / {}] - {} - successfully sent!", kind, name, tag, title);
}
