use pest::Parser;
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;

pub(crate) mod human;
pub(crate) mod json;

use self::human::HumanPolicyParser;
use self::json::JSONPolicyParser;

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum PolicyLanguage {
    JsonPolicy,
    HumanPolicy,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum PolicyType {
    And,
    Or,
}

/// Parsed policy tree. Gates always hold at least two children.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub enum PolicyValue {
    Object((PolicyType, Vec<PolicyValue>)),
    Not(Box<PolicyValue>),
    String(String),
}

pub fn parse(policy: &str, language: PolicyLanguage) -> Result<PolicyValue, NacAbeError> {
    match language {
        PolicyLanguage::JsonPolicy => {
            use self::json::Rule;
            let mut result = JSONPolicyParser::parse(Rule::content, policy)?;
            match result.next() {
                Some(pair) => json::parse(pair),
                None => Err(NacAbeError::malformed_policy("empty policy")),
            }
        }
        PolicyLanguage::HumanPolicy => {
            use self::human::Rule;
            let mut result = HumanPolicyParser::parse(Rule::content, policy)?;
            match result.next() {
                Some(pair) => human::parse(pair),
                None => Err(NacAbeError::malformed_policy("empty policy")),
            }
        }
    }
}

pub fn serialize_policy(val: &PolicyValue, language: PolicyLanguage) -> String {
    use self::PolicyValue::*;
    match language {
        PolicyLanguage::JsonPolicy => match val {
            Object((kind, children)) => {
                let contents: Vec<_> = children
                    .iter()
                    .map(|child| serialize_policy(child, language))
                    .collect();
                let name = match kind {
                    PolicyType::And => "and",
                    PolicyType::Or => "or",
                };
                format!("{{\"name\": \"{}\", \"children\": [{}]}}", name, contents.join(", "))
            }
            Not(inner) => format!(
                "{{\"name\": \"not\", \"children\": [{}]}}",
                serialize_policy(inner, language)
            ),
            String(s) => format!("{{\"name\": \"{}\"}}", s),
        },
        PolicyLanguage::HumanPolicy => match val {
            Object((kind, children)) => {
                let separator = match kind {
                    PolicyType::And => " and ",
                    PolicyType::Or => " or ",
                };
                let contents: Vec<_> = children
                    .iter()
                    .map(|child| match (kind, child) {
                        // `or` binds weaker than `and`
                        (PolicyType::And, Object((PolicyType::Or, _))) => {
                            format!("({})", serialize_policy(child, language))
                        }
                        _ => serialize_policy(child, language),
                    })
                    .collect();
                contents.join(separator)
            }
            Not(inner) => match inner.as_ref() {
                Object(_) => format!("not ({})", serialize_policy(inner, language)),
                _ => format!("not {}", serialize_policy(inner, language)),
            },
            String(s) => human_literal(s),
        },
    }
}

fn human_literal(attribute: &str) -> String {
    let lower = attribute.to_lowercase();
    let bare = !attribute.is_empty()
        && lower != "and"
        && lower != "or"
        && lower != "not"
        && attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.:@/".contains(c));
    if bare {
        attribute.to_string()
    } else {
        format!("\"{}\"", attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> PolicyValue {
        PolicyValue::String(name.to_string())
    }

    #[test]
    fn test_single_parsing() {
        let pol = String::from(r#"{"name": "A"}"#);
        let json: PolicyValue = parse(&pol, PolicyLanguage::JsonPolicy).expect("unsuccessful parse");
        let serialized_json = serialize_policy(&json, PolicyLanguage::JsonPolicy);
        assert_eq!(serialized_json, pol);
    }

    #[test]
    fn test_children_parsing() {
        let pol = String::from(r#"{"name": "and", "children": [{"name": "B"}, {"name": "C"}]}"#);
        let json: PolicyValue = parse(&pol, PolicyLanguage::JsonPolicy).expect("unsuccessful parse");
        let serialized_json = serialize_policy(&json, PolicyLanguage::JsonPolicy);
        assert_eq!(serialized_json, pol);
    }

    #[test]
    fn test_human_precedence() {
        let parsed = parse("a or b and c", PolicyLanguage::HumanPolicy).unwrap();
        assert_eq!(
            parsed,
            PolicyValue::Object((
                PolicyType::Or,
                vec![
                    leaf("a"),
                    PolicyValue::Object((PolicyType::And, vec![leaf("b"), leaf("c")])),
                ]
            ))
        );
    }

    #[test]
    fn test_human_parentheses() {
        let parsed = parse("(attr1 or attr2) and attr3", PolicyLanguage::HumanPolicy).unwrap();
        assert_eq!(
            parsed,
            PolicyValue::Object((
                PolicyType::And,
                vec![
                    PolicyValue::Object((PolicyType::Or, vec![leaf("attr1"), leaf("attr2")])),
                    leaf("attr3"),
                ]
            ))
        );
        assert_eq!(
            serialize_policy(&parsed, PolicyLanguage::HumanPolicy),
            "(attr1 or attr2) and attr3"
        );
    }

    #[test]
    fn test_human_flattens_chains() {
        let parsed = parse("a and (b and c) AND d", PolicyLanguage::HumanPolicy).unwrap();
        assert_eq!(
            parsed,
            PolicyValue::Object((PolicyType::And, vec![leaf("a"), leaf("b"), leaf("c"), leaf("d")]))
        );
    }

    #[test]
    fn test_human_negation_and_quotes() {
        let parsed = parse(r#"not "or" and !order"#, PolicyLanguage::HumanPolicy).unwrap();
        assert_eq!(
            parsed,
            PolicyValue::Object((
                PolicyType::And,
                vec![
                    PolicyValue::Not(Box::new(leaf("or"))),
                    PolicyValue::Not(Box::new(leaf("order"))),
                ]
            ))
        );
        assert_eq!(
            serialize_policy(&parsed, PolicyLanguage::HumanPolicy),
            r#"not "or" and not order"#
        );
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "a and", "or b", "(a or b", "a b", "and"] {
            let err = parse(bad, PolicyLanguage::HumanPolicy).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::MalformedPolicy, "{:?}", bad);
        }
        assert!(parse(r#"{"name": "and", "children": [{"name": "A"}]}"#, PolicyLanguage::JsonPolicy).is_err());
    }
}
