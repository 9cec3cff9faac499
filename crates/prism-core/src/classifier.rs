//! Maps vendor failures onto the canonical error kinds.
//!
//! Rules run in a fixed order and the first match wins. Quota and balance
//! come before the missing-key check: a provider with a valid key can still
//! be out of quota.

use prism_provider::{ClassifiedError, ErrorKind, Provider, ProviderError};

/// Signals one vendor uses to report each canonical failure.
///
/// Markers are matched case-insensitively against the error text and the
/// vendor code.
#[derive(Debug, Clone, Copy)]
pub struct VendorErrorProfile {
    /// Provider id this profile applies to; `None` for the generic profile.
    pub provider_id: Option<&'static str>,
    pub auth_markers: &'static [&'static str],
    /// Vendor codes for "free quota exhausted".
    pub quota_codes: &'static [&'static str],
    pub quota_markers: &'static [&'static str],
    /// HTTP status that accompanies a balance sub-code.
    pub balance_status: u16,
    pub balance_codes: &'static [&'static str],
    pub balance_markers: &'static [&'static str],
}

pub const GENERIC_PROFILE: VendorErrorProfile = VendorErrorProfile {
    provider_id: None,
    auth_markers: &[
        "unauthorized",
        "authenticationerror",
        "invalid api key",
        "incorrect api key",
    ],
    quota_codes: &[],
    quota_markers: &["free quota", "rate limit", "quota exceeded"],
    balance_status: 429,
    balance_codes: &["insufficient_quota"],
    balance_markers: &["insufficient balance", "insufficient_quota", "credit balance is too low"],
};

pub const ZHIPU_PROFILE: VendorErrorProfile = VendorErrorProfile {
    provider_id: Some("zhipu"),
    auth_markers: &["令牌已过期", "验证不正确", "authenticationerror", "unauthorized"],
    quota_codes: &["1304"],
    quota_markers: &["限额", "免费配额", "free quota", "rate limit"],
    balance_status: 429,
    balance_codes: &["1113"],
    balance_markers: &["余额不足", "insufficient balance"],
};

const PROFILES: &[VendorErrorProfile] = &[ZHIPU_PROFILE];

/// The profile for a provider, falling back to the generic one.
pub fn profile_for(provider: &Provider) -> &'static VendorErrorProfile {
    PROFILES
        .iter()
        .find(|p| p.provider_id == Some(provider.id.as_str()))
        .unwrap_or(&GENERIC_PROFILE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Auth,
    Quota,
    Balance,
    MissingKey,
}

const RULES: [Rule; 4] = [Rule::Auth, Rule::Quota, Rule::Balance, Rule::MissingKey];

struct Signals {
    status: Option<u16>,
    code: Option<String>,
    text: String,
}

impl Signals {
    fn of(error: &ProviderError) -> Self {
        Self {
            status: error.status(),
            code: error.vendor_code().map(str::to_string),
            text: error.to_string().to_lowercase(),
        }
    }

    fn mentions(&self, markers: &[&str]) -> bool {
        let code = self.code.as_deref().map(str::to_lowercase);
        markers.iter().any(|m| {
            let m = m.to_lowercase();
            self.text.contains(&m) || code.as_deref().is_some_and(|c| c.contains(&m))
        })
    }

    fn has_code(&self, codes: &[&str]) -> bool {
        self.code.as_deref().is_some_and(|c| codes.contains(&c))
    }
}

impl Rule {
    fn check(self, signals: &Signals, profile: &VendorErrorProfile, provider: &Provider) -> Option<ErrorKind> {
        let hit = match self {
            Rule::Auth => signals.status == Some(401) || signals.mentions(profile.auth_markers),
            Rule::Quota => {
                signals.has_code(profile.quota_codes) || signals.mentions(profile.quota_markers)
            }
            // Status + sub-code and the marker are independent alternatives
            Rule::Balance => {
                (signals.status == Some(profile.balance_status) && signals.has_code(profile.balance_codes))
                    || signals.mentions(profile.balance_markers)
            }
            // Keyless local servers fail without a status when they are down
            Rule::MissingKey => signals.status.is_some() && !provider.has_api_key(),
        };
        hit.then_some(match self {
            Rule::Auth | Rule::MissingKey => ErrorKind::NoApiKey,
            Rule::Quota => ErrorKind::QuotaExceeded,
            Rule::Balance => ErrorKind::InsufficientBalance,
        })
    }
}

/// Whether the classifier leaves this error alone regardless of content.
pub fn is_exempt(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Cancelled
            | ProviderError::CapabilityUnsupported { .. }
            | ProviderError::Classified(_)
    )
}

/// Classify a failure for a provider.
///
/// Returns `ProviderError::Classified` keyed `"<provider id>.<kind>"` when a
/// rule matches, otherwise the input unchanged.
pub fn classify(error: ProviderError, provider: &Provider) -> ProviderError {
    if is_exempt(&error) {
        return error;
    }

    let profile = profile_for(provider);
    let signals = Signals::of(&error);
    match RULES
        .iter()
        .find_map(|rule| rule.check(&signals, profile, provider))
    {
        Some(kind) => {
            tracing::debug!(provider = %provider.id, %kind, status = ?signals.status, "Classified provider error");
            ProviderError::Classified(ClassifiedError::new(kind, provider.id.clone(), error))
        }
        None => error,
    }
}
