use std::sync::Arc;

use crate::defaults::apply_defaults;
use crate::{sentry_debug, Client, ClientOptions, Hub};

/// Helper struct that is returned from `init`.
///
/// When this is dropped the current session is ended and events are drained
/// within the `shutdown_timeout`.
#[must_use = "when the init guard is dropped the transport will be shut down and no further \
              events can be sent.  If you do want to ignore this use mem::forget on it."]
pub struct ClientInitGuard(Arc<Client>);

impl ClientInitGuard {
    /// Quick check if the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    /// The client that was bound to the main hub.
    pub fn client(&self) -> &Arc<Client> {
        &self.0
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        if self.is_enabled() {
            sentry_debug!("dropping client guard -> disposing client");
        } else {
            sentry_debug!("dropping client guard (no client to dispose)");
        }
        let hub = Hub::main();
        if hub
            .client()
            .is_some_and(|client| Arc::ptr_eq(&client, &self.0))
        {
            hub.end_session();
        }
        self.0.close(None);
    }
}

/// Creates the Sentry client for a given client config and binds it.
///
/// Unset options are filled in from the environment first, see
/// [`apply_defaults`].  The client is bound to the main hub, which every
/// request hub created with [`Hub::new_from_top`] starts out from.  With
/// `auto_session_tracking` a session is started on the main hub right away.
///
/// This returns a client init guard that must kept in scope will help the
/// client send events before the application closes.  When the guard is
/// dropped then the transport that was initialized shuts down and no
/// further events can be set on it.
///
/// If you don't want (or can) keep the guard around it's permissible to
/// call `mem::forget` on it.
///
/// # Examples
///
/// ```
/// let _sentry = sentry_edge::init("https://key@sentry.io/1234");
/// ```
///
/// Or if draining on shutdown should be ignored:
///
/// ```
/// std::mem::forget(sentry_edge::init("https://key@sentry.io/1234"));
/// ```
///
/// The guard returned can also be inspected to see if a client has been
/// created to enable further configuration:
///
/// ```
/// let sentry = sentry_edge::init(sentry_edge::ClientOptions {
///     release: Some("foo-bar-baz@1.0.0".into()),
///     ..Default::default()
/// });
/// if sentry.is_enabled() {
///     sentry_edge::capture_message("ready", sentry_edge::Level::Info);
/// }
/// ```
pub fn init<C: Into<ClientOptions>>(opts: C) -> ClientInitGuard {
    let options = apply_defaults(opts.into());
    let auto_session_tracking = options.auto_session_tracking;
    let client = Arc::new(Client::with_options(options));
    let hub = Hub::main();
    hub.bind_client(Some(client.clone()));
    if let Some(dsn) = client.dsn() {
        sentry_debug!("enabled sentry client for DSN {}", dsn);
    } else {
        sentry_debug!("initialized disabled sentry client due to disabled or invalid DSN");
    }
    if auto_session_tracking {
        hub.start_session();
    }
    ClientInitGuard(client)
}
