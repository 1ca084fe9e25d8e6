// src/core/policy.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::core::errors::GovernorError;
use crate::core::models::HttpMethod;

/// DKIM selectors that may be queried under the full DNS policy. Fixed by
/// design: the noise contract promises no selector outside this set is ever
/// looked up.
pub const DKIM_SELECTOR_SAFELIST: &[&str] =
    &["default", "selector1", "selector2", "google", "k1", "k2"];

/// How loud a run is allowed to be.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// No target HTTP at all.
    Passive,
    /// Tiny, capped target HEAD checks on top of passive collection.
    LowNoise,
}

/// How much DNS contact a run is allowed to make.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DnsPolicy {
    /// No DNS queries whatsoever.
    None,
    /// Apex TXT/MX and `_dmarc` TXT only.
    Minimal,
    /// A/AAAA/NS/MX/TXT on in-scope names, plus safelisted DKIM selectors
    /// when the mode is low-noise.
    Full,
}

/// The resolved, immutable noise contract for one run.
///
/// Built exactly once by [`resolve`] from the raw configuration strings and
/// never re-interpreted afterwards; every governor check consults this object,
/// not the flags it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    /// Lower-cased apex domain the run is scoped to.
    pub domain: String,
    pub mode: Mode,
    pub dns_policy: DnsPolicy,
    pub allowed_http_methods: Vec<HttpMethod>,
    pub dkim_selector_safelist: Vec<String>,
    /// True when the mode came in through a deprecated alias
    /// (`enhanced`/`active`). The caller owns surfacing the notice.
    pub deprecated_alias: bool,
}

impl Policy {
    /// Whether `host` is the apex or one of its subdomains.
    pub fn is_in_scope(&self, host: &str) -> bool {
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }

    pub fn dmarc_name(&self) -> String {
        format!("_dmarc.{}", self.domain)
    }

    pub fn dkim_name(&self, selector: &str) -> String {
        format!("{selector}._domainkey.{}", self.domain)
    }

    /// Extracts the DKIM selector from a `<selector>._domainkey.<apex>`
    /// query name, if that is what `name` is.
    pub fn dkim_selector_of<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_suffix(&format!("._domainkey.{}", self.domain))
            .filter(|s| !s.is_empty() && !s.contains('.'))
    }
}

/// Turns raw configuration strings into one canonical [`Policy`].
///
/// Deterministic and side-effect free: identical inputs always yield
/// identical policies, so the manifest's sanitized config is reproducible
/// from the raw flags. Legacy mode aliases `enhanced` and `active` normalize
/// to low-noise with `deprecated_alias` set. An explicit dns-policy value is
/// authoritative; an alias only ever affects the mode.
pub fn resolve(
    raw_mode: &str,
    raw_dns_policy: &str,
    domain: &str,
    allow_get: bool,
) -> Result<Policy, GovernorError> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err(GovernorError::InvalidPolicy(
            "domain must not be empty".to_string(),
        ));
    }

    let raw_mode = raw_mode.trim().to_ascii_lowercase();
    let (mode, deprecated_alias) = match raw_mode.as_str() {
        "enhanced" | "active" => (Mode::LowNoise, true),
        other => (
            Mode::from_str(other).map_err(|_| {
                GovernorError::InvalidPolicy(format!("unrecognized mode '{other}'"))
            })?,
            false,
        ),
    };

    let raw_dns_policy = raw_dns_policy.trim().to_ascii_lowercase();
    let dns_policy = DnsPolicy::from_str(&raw_dns_policy).map_err(|_| {
        GovernorError::InvalidPolicy(format!("unrecognized dns-policy '{raw_dns_policy}'"))
    })?;

    let allowed_http_methods = match mode {
        Mode::Passive => Vec::new(),
        Mode::LowNoise => {
            if allow_get {
                vec![HttpMethod::Head, HttpMethod::Get]
            } else {
                vec![HttpMethod::Head]
            }
        }
    };

    Ok(Policy {
        domain,
        mode,
        dns_policy,
        allowed_http_methods,
        dkim_selector_safelist: DKIM_SELECTOR_SAFELIST
            .iter()
            .map(|s| s.to_string())
            .collect(),
        deprecated_alias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_modes() {
        let passive = resolve("passive", "minimal", "Example.COM", false).unwrap();
        assert_eq!(passive.mode, Mode::Passive);
        assert_eq!(passive.domain, "example.com");
        assert!(!passive.deprecated_alias);
        assert!(passive.allowed_http_methods.is_empty());

        let low_noise = resolve("low-noise", "full", "example.com", false).unwrap();
        assert_eq!(low_noise.mode, Mode::LowNoise);
        assert_eq!(low_noise.allowed_http_methods, vec![HttpMethod::Head]);
    }

    #[test]
    fn legacy_aliases_normalize_to_low_noise() {
        for alias in ["enhanced", "active", " Enhanced "] {
            let policy = resolve(alias, "minimal", "example.com", false).unwrap();
            assert_eq!(policy.mode, Mode::LowNoise);
            assert!(policy.deprecated_alias, "alias {alias:?} should flag");
        }
    }

    #[test]
    fn alias_does_not_touch_dns_policy() {
        let policy = resolve("enhanced", "none", "example.com", false).unwrap();
        assert_eq!(policy.dns_policy, DnsPolicy::None);
    }

    #[test]
    fn unrecognized_values_are_rejected() {
        assert!(matches!(
            resolve("stealth", "minimal", "example.com", false),
            Err(GovernorError::InvalidPolicy(_))
        ));
        assert!(matches!(
            resolve("passive", "everything", "example.com", false),
            Err(GovernorError::InvalidPolicy(_))
        ));
        assert!(matches!(
            resolve("passive", "minimal", "  ", false),
            Err(GovernorError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = resolve("active", "full", "example.com", true).unwrap();
        let b = resolve("active", "full", "example.com", true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn allow_get_extends_the_method_set() {
        let policy = resolve("low-noise", "minimal", "example.com", true).unwrap();
        assert_eq!(
            policy.allowed_http_methods,
            vec![HttpMethod::Head, HttpMethod::Get]
        );
    }

    #[test]
    fn dkim_selector_extraction() {
        let policy = resolve("low-noise", "full", "example.com", false).unwrap();
        assert_eq!(
            policy.dkim_selector_of("google._domainkey.example.com"),
            Some("google")
        );
        assert_eq!(policy.dkim_selector_of("example.com"), None);
        assert_eq!(policy.dkim_selector_of("a.b._domainkey.example.com"), None);
        assert_eq!(policy.dkim_selector_of("._domainkey.example.com"), None);
    }

    #[test]
    fn scope_check_covers_apex_and_subdomains() {
        let policy = resolve("passive", "minimal", "example.com", false).unwrap();
        assert!(policy.is_in_scope("example.com"));
        assert!(policy.is_in_scope("mail.example.com"));
        assert!(!policy.is_in_scope("evil.com"));
        assert!(!policy.is_in_scope("notexample.com"));
    }
}
