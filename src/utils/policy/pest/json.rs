use pest::iterators::Pair;
use pest_derive::Parser;
use crate::error::NacAbeError;
use crate::utils::policy::pest::{PolicyType, PolicyValue};

#[derive(Parser)]
#[grammar = "json.policy.pest"]
pub(crate) struct JSONPolicyParser;

pub(crate) fn parse(pair: Pair<Rule>) -> Result<PolicyValue, NacAbeError> {
    match pair.as_rule() {
        Rule::content => match pair.into_inner().next() {
            Some(inner) => parse(inner),
            None => Err(NacAbeError::malformed_policy("empty policy")),
        },
        Rule::node => {
            let mut inner = pair.into_inner();
            let name = match inner.next() {
                Some(string) => string
                    .into_inner()
                    .next()
                    .map(|value| value.as_str().to_string())
                    .unwrap_or_default(),
                None => return Err(NacAbeError::malformed_policy("node without name")),
            };
            let mut children = Vec::new();
            for child in inner {
                children.push(parse(child)?);
            }
            node(name, children)
        }
        other => Err(NacAbeError::malformed_policy(
            &format!("unexpected token {:?}", other)
        )),
    }
}

fn node(name: String, mut children: Vec<PolicyValue>) -> Result<PolicyValue, NacAbeError> {
    match (name.to_lowercase().as_str(), children.len()) {
        (_, 0) if name.is_empty() => Err(NacAbeError::malformed_policy("empty attribute")),
        (_, 0) => Ok(PolicyValue::String(name)),
        ("not", 1) => Ok(PolicyValue::Not(Box::new(children.remove(0)))),
        ("and", n) if n >= 2 => Ok(PolicyValue::Object((PolicyType::And, children))),
        ("or", n) if n >= 2 => Ok(PolicyValue::Object((PolicyType::Or, children))),
        (gate, n) => Err(NacAbeError::malformed_policy(
            &format!("invalid node \"{}\" with {} children", gate, n)
        )),
    }
}
