use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::dsn::Dsn;
use crate::protocol;

/// Represents an auth header parsing error.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum ParseAuthError {
    /// Raised if the auth header is not indicating sentry auth
    #[error("non sentry auth")]
    NonSentryAuth,
    /// Raised if the version value is invalid
    #[error("invalid value for version")]
    InvalidVersion,
    /// Raised if the public key is missing entirely
    #[error("missing public key in auth header")]
    MissingPublicKey,
}

/// Represents an auth header.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    client: Option<String>,
    version: u16,
    key: String,
    secret: Option<String>,
}

impl Auth {
    /// Returns the protocol version the client speaks
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Returns the public key
    pub fn public_key(&self) -> &str {
        &self.key
    }

    /// Returns the client's secret if it authenticated with a secret.
    pub fn secret_key(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Returns true if the authentication implies public auth (no secret)
    pub fn is_public(&self) -> bool {
        self.secret.is_none()
    }

    /// Returns the client's agent
    pub fn client_agent(&self) -> Option<&str> {
        self.client.as_deref()
    }
}

impl fmt::Display for Auth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Sentry sentry_key={}, sentry_version={}",
            self.key, self.version
        )?;
        if let Some(ref client) = self.client {
            write!(f, ", sentry_client={client}")?;
        }
        if let Some(ref secret) = self.secret {
            write!(f, ", sentry_secret={secret}")?;
        }
        Ok(())
    }
}

impl FromStr for Auth {
    type Err = ParseAuthError;

    fn from_str(s: &str) -> Result<Auth, ParseAuthError> {
        let mut rv = Auth::default();
        let (scheme, items) = s.trim().split_once(' ').unwrap_or((s, ""));
        if !scheme.eq_ignore_ascii_case("sentry") {
            return Err(ParseAuthError::NonSentryAuth);
        }

        for item in items.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "sentry_client" => rv.client = Some(value.into()),
                "sentry_version" => {
                    rv.version = value.parse().map_err(|_| ParseAuthError::InvalidVersion)?;
                }
                "sentry_key" => rv.key = value.into(),
                "sentry_secret" => rv.secret = Some(value.into()),
                _ => {}
            }
        }

        if rv.key.is_empty() {
            return Err(ParseAuthError::MissingPublicKey);
        }
        if rv.version == 0 {
            rv.version = protocol::LATEST;
        }

        Ok(rv)
    }
}

pub(crate) fn auth_from_dsn_and_client(dsn: &Dsn, client: Option<&str>) -> Auth {
    Auth {
        client: client.map(|x| x.to_string()),
        version: protocol::LATEST,
        key: dsn.public_key().to_string(),
        secret: dsn.secret_key().map(|x| x.to_string()),
    }
}

/// Formats the value for an `X-Sentry-Auth` header.
pub fn auth_header(dsn: &Dsn, user_agent: &str) -> String {
    dsn.to_auth(Some(user_agent)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_parsing() {
        let auth: Auth = "Sentry sentry_client=sentry.rust.edge/0.1.0, \
                          sentry_version=7, \
                          sentry_key=public, \
                          sentry_secret=secret"
            .parse()
            .unwrap();
        assert_eq!(auth.client_agent(), Some("sentry.rust.edge/0.1.0"));
        assert_eq!(auth.version(), 7);
        assert_eq!(auth.public_key(), "public");
        assert_eq!(auth.secret_key(), Some("secret"));
        assert!(!auth.is_public());

        assert_eq!(
            auth.to_string(),
            "Sentry sentry_key=public, \
             sentry_version=7, \
             sentry_client=sentry.rust.edge/0.1.0, \
             sentry_secret=secret"
        );
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            "Basic Zm9vOmJhcg==".parse::<Auth>(),
            Err(ParseAuthError::NonSentryAuth)
        );
        assert_eq!(
            "Sentry sentry_version=7".parse::<Auth>(),
            Err(ParseAuthError::MissingPublicKey)
        );
        assert_eq!(
            "Sentry sentry_key=public, sentry_version=x".parse::<Auth>(),
            Err(ParseAuthError::InvalidVersion)
        );
    }

    #[test]
    fn test_auth_from_dsn() {
        let dsn: Dsn = "https://public@sentry.invalid/1".parse().unwrap();
        assert_eq!(
            auth_header(&dsn, "sentry.rust.edge/0.1.0"),
            "Sentry sentry_key=public, sentry_version=7, sentry_client=sentry.rust.edge/0.1.0"
        );
        assert!(dsn.to_auth(None).is_public());
    }
}
