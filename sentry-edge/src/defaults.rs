use std::borrow::Cow;
use std::env;
use std::sync::Arc;

use crate::{sentry_debug, ClientOptions, IntoDsn};

/// Apply default client options.
///
/// Extends the given `ClientOptions` with default options such as a default
/// transport, a set of default integrations if not requested otherwise, and
/// also sets the `dsn`, `release`, `environment`, and proxy settings based
/// on environment variables.
///
/// Options that were set explicitly are never overwritten.  When neither the
/// options nor `SENTRY_ENVIRONMENT` name an environment, it defaults to
/// `development` for debug builds and `production` otherwise.
///
/// When the `default_integrations` option is set to `true` (by default), the
/// following integrations will be added *before* any manually defined
/// integrations, depending on enabled feature flags:
///
/// 1. [`DedupeIntegration`] (`feature = "dedupe"`)
///
/// [`DedupeIntegration`]: crate::integrations::dedupe::DedupeIntegration
///
/// # Examples
/// ```
/// std::env::set_var("SENTRY_RELEASE", "release-from-env");
///
/// let options = sentry_edge::ClientOptions::default();
/// assert_eq!(options.release, None);
/// assert!(options.transport.is_none());
///
/// let options = sentry_edge::apply_defaults(options);
/// assert_eq!(options.release, Some("release-from-env".into()));
/// assert!(options.transport.is_some());
/// ```
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    #[cfg(feature = "reqwest")]
    if opts.transport.is_none() {
        opts.transport = Some(Arc::new(crate::transports::DefaultTransportFactory));
    }
    if opts.default_integrations {
        // default integrations need to be ordered *before* custom integrations,
        // since they also process events in order
        #[allow(unused_mut)]
        let mut integrations: Vec<Arc<dyn crate::Integration>> = vec![];
        #[cfg(feature = "dedupe")]
        {
            integrations.push(Arc::new(
                crate::integrations::dedupe::DedupeIntegration::default(),
            ));
        }
        integrations.extend(opts.integrations);
        opts.integrations = integrations;
    }
    if opts.dsn.is_none() {
        opts.dsn = match env::var_os("SENTRY_DSN").into_dsn() {
            Ok(dsn) => dsn,
            Err(err) => {
                sentry_debug!("Ignoring invalid SENTRY_DSN: {}", err);
                None
            }
        };
    }
    if opts.release.is_none() {
        opts.release = env::var("SENTRY_RELEASE").ok().map(Cow::Owned);
    }
    if opts.environment.is_none() {
        opts.environment = env::var("SENTRY_ENVIRONMENT")
            .ok()
            .map(Cow::Owned)
            .or_else(|| {
                Some(Cow::Borrowed(if cfg!(debug_assertions) {
                    "development"
                } else {
                    "production"
                }))
            });
    }
    if opts.http_proxy.is_none() {
        opts.http_proxy = env::var("HTTP_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("http_proxy").ok().map(Cow::Owned));
    }
    if opts.https_proxy.is_none() {
        opts.https_proxy = env::var("HTTPS_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("https_proxy").ok().map(Cow::Owned))
            .or_else(|| opts.http_proxy.clone());
    }
    opts
}
