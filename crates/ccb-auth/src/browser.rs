//! Best-effort browser launch for the consent page

/// Open `url` in the default browser without waiting for it.
///
/// Only reports whether the platform opener could be started.
pub fn open(url: &str) -> std::io::Result<()> {
    webbrowser::open(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn open_fits_the_authorizer_launcher() {
        let launcher: Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync> = Arc::new(open);
        // Not invoked: a test run must not spawn a real browser
        drop(launcher);
    }
}
