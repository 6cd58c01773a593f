// ============================================================================
// Validation result
// ============================================================================

/// Outcome of running the intent validator.
///
/// `Malformed` means the payload could not even be interpreted (missing
/// envelope, undecodable XDR); `Invalid` means it decoded but failed an
/// authenticity or structural check. The distinction is informational —
/// both block settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
    Malformed(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(r) | Self::Malformed(r) => Some(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert!(ValidationResult::Valid.is_valid());
        assert!(ValidationResult::Valid.reason().is_none());

        let invalid = ValidationResult::Invalid("No signatures present".into());
        assert!(!invalid.is_valid());
        assert_eq!(invalid.reason(), Some("No signatures present"));

        let malformed = ValidationResult::Malformed("bad xdr".into());
        assert!(!malformed.is_valid());
        assert_eq!(malformed.reason(), Some("bad xdr"));
    }
}
