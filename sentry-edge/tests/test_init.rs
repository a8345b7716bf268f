#![cfg(feature = "test")]

use std::env;
use std::sync::Arc;

use serial_test::serial;

use sentry_edge::protocol::{EnvelopeItem, SessionStatus};
use sentry_edge::test::TestTransport;

fn clear_env() {
    for var in [
        "SENTRY_DSN",
        "SENTRY_RELEASE",
        "SENTRY_ENVIRONMENT",
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_from_env() {
    clear_env();
    env::set_var("SENTRY_DSN", "https://public@example.com/42");
    env::set_var("SENTRY_RELEASE", "app@1.2.3");
    env::set_var("SENTRY_ENVIRONMENT", "staging");
    env::set_var("HTTP_PROXY", "http://proxy.local:3128");

    let options = sentry_edge::apply_defaults(Default::default());
    assert_eq!(options.dsn.as_ref().unwrap().host(), "example.com");
    assert_eq!(options.release.as_deref(), Some("app@1.2.3"));
    assert_eq!(options.environment.as_deref(), Some("staging"));
    assert_eq!(options.http_proxy.as_deref(), Some("http://proxy.local:3128"));
    // https falls back to the http proxy
    assert_eq!(
        options.https_proxy.as_deref(),
        Some("http://proxy.local:3128")
    );

    clear_env();
}

#[test]
#[serial]
fn test_user_options_win() {
    clear_env();
    env::set_var("SENTRY_DSN", "https://public@example.com/42");
    env::set_var("SENTRY_RELEASE", "app@1.2.3");
    env::set_var("SENTRY_ENVIRONMENT", "staging");

    let options = sentry_edge::apply_defaults(sentry_edge::ClientOptions {
        dsn: "https://other@sentry.example.org/7".parse().ok(),
        release: Some("explicit@2.0.0".into()),
        environment: Some("edge".into()),
        ..Default::default()
    });
    assert_eq!(options.dsn.as_ref().unwrap().host(), "sentry.example.org");
    assert_eq!(options.release.as_deref(), Some("explicit@2.0.0"));
    assert_eq!(options.environment.as_deref(), Some("edge"));

    clear_env();
}

#[test]
#[serial]
fn test_default_environment() {
    clear_env();

    let options = sentry_edge::apply_defaults(Default::default());
    assert!(options.dsn.is_none());
    let expected = if cfg!(debug_assertions) {
        "development"
    } else {
        "production"
    };
    assert_eq!(options.environment.as_deref(), Some(expected));
}

#[test]
#[serial]
fn test_init_binds_main_hub() {
    clear_env();
    let transport = TestTransport::new();
    let guard = sentry_edge::init(sentry_edge::ClientOptions {
        dsn: "https://public@example.com/1".parse().ok(),
        release: Some("app@1.0.0".into()),
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    });
    assert!(guard.is_enabled());

    // request hubs start out from the main hub
    let hub = sentry_edge::Hub::new_from_top(&sentry_edge::Hub::main());
    hub.capture_message("from a request", sentry_edge::Level::Info);
    drop(hub);
    drop(guard);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.as_deref(), Some("from a request"));
    assert_eq!(events[0].release.as_deref(), Some("app@1.0.0"));

    sentry_edge::Hub::main().bind_client(None);
}

#[test]
#[serial]
fn test_init_auto_session_tracking() {
    clear_env();
    let transport = TestTransport::new();
    let guard = sentry_edge::init(sentry_edge::ClientOptions {
        dsn: "https://public@example.com/1".parse().ok(),
        release: Some("app@1.0.0".into()),
        auto_session_tracking: true,
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    });
    sentry_edge::capture_message("oh no", sentry_edge::Level::Error);
    drop(guard);

    let updates: Vec<_> = transport
        .fetch_and_clear_envelopes()
        .iter()
        .flat_map(|envelope| envelope.items().cloned().collect::<Vec<_>>())
        .filter_map(|item| match item {
            EnvelopeItem::SessionUpdate(update) => Some(update),
            _ => None,
        })
        .collect();

    let first = updates.first().unwrap();
    assert!(first.init);
    assert_eq!(first.errors, 1);
    let last = updates.last().unwrap();
    assert_eq!(last.status, SessionStatus::Exited);
    assert_eq!(last.errors, 1);

    sentry_edge::Hub::main().bind_client(None);
}
