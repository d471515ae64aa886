//! Boolean attribute policies.
//!
//! Producers use this module only to validate a policy before handing it to
//! the CP-ABE scheme and consumers to explain a failed decryption; the
//! authoritative check is the decryption itself.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use nacabe::utils::policy::Policy;
//! let policy: Policy = "(attr1 or attr2) and attr3".parse().unwrap();
//! let held: BTreeSet<String> = ["attr1", "attr3"].iter().map(|a| a.to_string()).collect();
//! assert!(policy.is_satisfied_by(&held));
//! ```
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FormatResult},
    str::FromStr,
};
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;

pub mod pest;

use self::pest::{parse, serialize_policy, PolicyLanguage, PolicyType, PolicyValue};

/// A parsed policy together with the language it was written in.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Policy {
    root: PolicyValue,
    language: PolicyLanguage,
}

impl Policy {
    pub fn new(policy: &str, language: PolicyLanguage) -> Result<Policy, NacAbeError> {
        Ok(Policy { root: parse(policy, language)?, language })
    }

    pub fn root(&self) -> &PolicyValue {
        &self.root
    }

    pub fn language(&self) -> PolicyLanguage {
        self.language
    }

    /// Evaluates the policy against a plain attribute set.
    pub fn is_satisfied_by(&self, attributes: &BTreeSet<String>) -> bool {
        traverse_policy(attributes, &self.root)
    }

    /// Every attribute literal the policy mentions.
    pub fn attributes(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        collect_attributes(&self.root, &mut found);
        found
    }

    pub fn has_negation(&self) -> bool {
        contains_negation(&self.root)
    }

    /// CP-ABE can only express monotone policies.
    pub fn validate_for_encryption(&self) -> Result<(), NacAbeError> {
        if self.has_negation() {
            return Err(NacAbeError::malformed_policy(
                "negated attributes cannot be enforced by the CP-ABE scheme",
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        serialize_policy(&self.root, PolicyLanguage::JsonPolicy)
    }
}

impl FromStr for Policy {
    type Err = NacAbeError;

    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        Policy::new(policy, PolicyLanguage::HumanPolicy)
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(&serialize_policy(&self.root, PolicyLanguage::HumanPolicy))
    }
}

/// Short-circuit evaluation of a policy tree.
pub fn traverse_policy(attributes: &BTreeSet<String>, value: &PolicyValue) -> bool {
    match value {
        PolicyValue::String(attribute) => attributes.contains(attribute),
        PolicyValue::Not(inner) => !traverse_policy(attributes, inner),
        PolicyValue::Object((PolicyType::And, children)) => {
            children.iter().all(|child| traverse_policy(attributes, child))
        }
        PolicyValue::Object((PolicyType::Or, children)) => {
            children.iter().any(|child| traverse_policy(attributes, child))
        }
    }
}

fn collect_attributes(value: &PolicyValue, found: &mut BTreeSet<String>) {
    match value {
        PolicyValue::String(attribute) => {
            found.insert(attribute.clone());
        }
        PolicyValue::Not(inner) => collect_attributes(inner, found),
        PolicyValue::Object((_, children)) => {
            for child in children {
                collect_attributes(child, found);
            }
        }
    }
}

fn contains_negation(value: &PolicyValue) -> bool {
    match value {
        PolicyValue::String(_) => false,
        PolicyValue::Not(_) => true,
        PolicyValue::Object((_, children)) => children.iter().any(contains_negation),
    }
}
