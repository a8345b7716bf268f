/// Returns the intended release for Sentry as an `Option<Cow<'static, str>>`.
///
/// This can be used with `ClientOptions` to set the release name.  It uses
/// the information supplied by cargo to calculate a release.
///
/// # Examples
///
/// ```
/// let _sentry = sentry_edge::init(sentry_edge::ClientOptions {
///     release: sentry_edge::release_name!(),
///     ..Default::default()
/// });
/// ```
#[macro_export]
macro_rules! release_name {
    () => {{
        use std::sync::OnceLock;
        static RELEASE: OnceLock<Option<String>> = OnceLock::new();
        RELEASE
            .get_or_init(|| {
                option_env!("CARGO_PKG_NAME").and_then(|name| {
                    option_env!("CARGO_PKG_VERSION").map(|version| format!("{}@{}", name, version))
                })
            })
            .as_deref()
            .map(::std::borrow::Cow::Borrowed)
    }};
}

/// Prints internal diagnostics when a client with `debug: true` was created.
///
/// With the `debug-logs` feature the message goes to the `sentry` log target
/// instead.
#[cfg(not(feature = "debug-logs"))]
#[macro_export]
#[doc(hidden)]
macro_rules! sentry_debug {
    ($($arg:tt)*) => {
        if $crate::debug_enabled() {
            eprint!("[sentry] ");
            eprintln!($($arg)*);
        }
    }
}

/// Prints internal diagnostics when a client with `debug: true` was created.
///
/// With the `debug-logs` feature the message goes to the `sentry` log target
/// instead.
#[cfg(feature = "debug-logs")]
#[macro_export]
#[doc(hidden)]
macro_rules! sentry_debug {
    ($($arg:tt)*) => {
        $crate::__log::debug!(target: "sentry", $($arg)*);
    }
}

/// Panics in debug builds and logs through `sentry_debug!` in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_panic_or_log {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        panic!($($arg)*);

        #[cfg(not(debug_assertions))]
        $crate::sentry_debug!($($arg)*);
    }};
}

/// If the condition is false, panics in debug builds and logs in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_assert_or_log {
    ($cond:expr $(,)?) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!("assertion failed: {}", stringify!($cond));
        }
    }};
    ($cond:expr, $($arg:tt)+) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!($($arg)+);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn debug_assert_or_log_does_not_panic_when_condition_holds() {
        crate::debug_assert_or_log!(2 + 2 == 4, "should not panic");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "assertion failed: 1 == 2")]
    fn debug_assert_or_log_panics_with_default_message_when_condition_fails() {
        crate::debug_assert_or_log!(1 == 2);
    }

    #[test]
    fn release_name_uses_cargo_metadata() {
        let release = crate::release_name!();
        assert_eq!(
            release.as_deref(),
            Some(concat!("sentry-edge-core@", env!("CARGO_PKG_VERSION")))
        );
    }
}
