//! Injectable vendor faults for exercising error handling.
//!
//! A fault set on [`CompletionsContext`](crate::context::CompletionsContext)
//! is raised inside the error boundary in place of the vendor call.

use prism_provider::ProviderError;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedFault {
    NoApiKey,
    InsufficientBalance,
    QuotaExceeded,
    /// Any other name: a generic server error.
    Unknown(String),
}

impl SimulatedFault {
    /// The vendor error this fault stands for.
    pub fn to_error(&self) -> ProviderError {
        let (status, message) = match self {
            SimulatedFault::NoApiKey => (401, "API key is required"),
            SimulatedFault::InsufficientBalance => (402, "余额不足 insufficient balance"),
            SimulatedFault::QuotaExceeded => (429, "免费配额已用尽 free quota exceeded"),
            SimulatedFault::Unknown(_) => (500, "Unknown error"),
        };
        ProviderError::ApiError {
            status,
            code: None,
            message: message.to_string(),
        }
    }
}

impl FromStr for SimulatedFault {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "no_api_key" => SimulatedFault::NoApiKey,
            "insufficient_balance" => SimulatedFault::InsufficientBalance,
            "quota_exceeded" => SimulatedFault::QuotaExceeded,
            other => SimulatedFault::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for SimulatedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatedFault::NoApiKey => f.write_str("no_api_key"),
            SimulatedFault::InsufficientBalance => f.write_str("insufficient_balance"),
            SimulatedFault::QuotaExceeded => f.write_str("quota_exceeded"),
            SimulatedFault::Unknown(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use prism_provider::Provider;

    #[test]
    fn test_parse() {
        assert_eq!("no_api_key".parse::<SimulatedFault>(), Ok(SimulatedFault::NoApiKey));
        assert_eq!(
            "whatever".parse::<SimulatedFault>(),
            Ok(SimulatedFault::Unknown("whatever".to_string()))
        );
    }

    #[test]
    fn test_fault_statuses() {
        assert_eq!(SimulatedFault::NoApiKey.to_error().status(), Some(401));
        assert_eq!(SimulatedFault::InsufficientBalance.to_error().status(), Some(402));
        assert_eq!(SimulatedFault::QuotaExceeded.to_error().status(), Some(429));
        let unknown = SimulatedFault::Unknown("x".to_string()).to_error();
        assert_eq!(unknown.status(), Some(500));
        assert_eq!(unknown.message(), "Unknown error");
    }

    #[test]
    fn test_faults_classify_to_their_kind() {
        let provider = Provider::new("zhipu", "openai", "").with_api_key("k");
        for (fault, key) in [
            (SimulatedFault::NoApiKey, Some("zhipu.no_api_key")),
            (SimulatedFault::InsufficientBalance, Some("zhipu.insufficient_balance")),
            (SimulatedFault::QuotaExceeded, Some("zhipu.quota_exceeded")),
            (SimulatedFault::Unknown("other".to_string()), None),
        ] {
            let err = classify(fault.to_error(), &provider);
            let got = match &err {
                ProviderError::Classified(c) => Some(c.key()),
                _ => None,
            };
            assert_eq!(got.as_deref(), key, "fault {fault}");
        }
    }
}
