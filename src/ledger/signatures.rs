use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::WithdrawalError;

/// Delimiter used when the set is flattened into the `signatures` column.
pub const SIGNATURE_DELIMITER: &str = ",";

/// Ordered signer contributions, in submission order, duplicates kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureSet(Vec<String>);

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from caller-supplied signatures, rejecting tokens the
    /// storage column could not round-trip.
    pub fn from_submitted<I, S>(signatures: I) -> Result<Self, WithdrawalError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signatures: Vec<String> = signatures.into_iter().map(Into::into).collect();
        for signature in &signatures {
            validate_signature(signature)?;
        }
        Ok(Self(signatures))
    }

    /// Parses the nullable `signatures` column.
    pub fn from_column(column: Option<&str>) -> Self {
        match column {
            Some(joined) if !joined.is_empty() => Self(
                joined
                    .split(SIGNATURE_DELIMITER)
                    .map(str::to_string)
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Flattens the set for storage; an empty set is stored as NULL.
    pub fn to_column(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(SIGNATURE_DELIMITER))
        }
    }

    /// Prior contributions followed by `submitted`.
    pub fn merged_with(&self, submitted: &SignatureSet) -> SignatureSet {
        let mut merged = Vec::with_capacity(self.0.len() + submitted.0.len());
        merged.extend(self.0.iter().cloned());
        merged.extend(submitted.0.iter().cloned());
        SignatureSet(merged)
    }

    /// True when `self` starts with every contribution of `prior`, in order.
    pub fn extends(&self, prior: &SignatureSet) -> bool {
        self.0.starts_with(&prior.0)
    }

    pub fn distinct_count(&self) -> usize {
        self.0.iter().collect::<HashSet<_>>().len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

fn validate_signature(signature: &str) -> Result<(), WithdrawalError> {
    if signature.trim().is_empty() {
        return Err(WithdrawalError::InvalidInput(
            "Signature cannot be empty".to_string(),
        ));
    }
    if signature.contains(SIGNATURE_DELIMITER) {
        return Err(WithdrawalError::InvalidInput(format!(
            "Signature may not contain '{}'",
            SIGNATURE_DELIMITER
        )));
    }
    Ok(())
}
