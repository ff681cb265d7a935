//! Phone number validation.
//!
//! Which numbers are orderable is a deployment policy, so the rule is a
//! single injectable predicate rather than a pattern scattered across
//! handlers. The default accepts Ethiopian mobile numbers: a leading `0`
//! or `+251`, then `9` or `7`, then eight more digits.

use regex::Regex;

/// Default accepted pattern (Ethiopian mobile numbers).
pub const DEFAULT_PATTERN: &str = r"^(\+251|0)(9|7)[0-9]{8}$";

/// A compiled phone-number predicate.
#[derive(Debug, Clone)]
pub struct PhoneValidator {
    pattern: Regex,
}

impl PhoneValidator {
    /// Build a validator from a custom pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Build the deployed validator: PHONE_PATTERN from the environment if
    /// set and valid, otherwise the default rule. A bad override logs and
    /// falls back rather than refusing to start.
    pub fn from_env() -> Self {
        if let Some(custom) = crate::config::PHONE_PATTERN.as_deref() {
            match Self::new(custom) {
                Ok(v) => return v,
                Err(e) => log::warn!("Invalid PHONE_PATTERN {:?}, using default: {}", custom, e),
            }
        }
        Self::default()
    }

    /// Whether `raw` is an acceptable phone number.
    pub fn is_valid(&self, raw: &str) -> bool {
        self.pattern.is_match(raw.trim())
    }
}

impl Default for PhoneValidator {
    // The default pattern is a compile-time constant; failing to compile
    // it is a programming error, not a runtime condition.
    #[allow(clippy::unwrap_used)]
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN).unwrap()
    }
}
