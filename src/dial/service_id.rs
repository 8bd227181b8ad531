use std::fmt;

use thiserror::Error;

/// A `domain.service` pair, e.g. `light.toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceId<'a> {
    pub domain: &'a str,
    pub service: &'a str,
}

impl fmt::Display for ServiceId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseServiceIdError {
    #[error("service id is empty")]
    Empty,
    #[error("'{0}' has no '.' between domain and service")]
    MissingSeparator(String),
    #[error("'{0}' has an empty domain")]
    EmptyDomain(String),
    #[error("'{0}' has an empty service name")]
    EmptyService(String),
}

/// Splits on the first `.`; everything after it belongs to the service name.
pub fn parse_service_id(raw: &str) -> Result<ServiceId<'_>, ParseServiceIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseServiceIdError::Empty);
    }

    let Some((domain, service)) = trimmed.split_once('.') else {
        return Err(ParseServiceIdError::MissingSeparator(trimmed.to_string()));
    };

    if domain.is_empty() {
        return Err(ParseServiceIdError::EmptyDomain(trimmed.to_string()));
    }
    if service.is_empty() {
        return Err(ParseServiceIdError::EmptyService(trimmed.to_string()));
    }

    Ok(ServiceId { domain, service })
}
