use pest::iterators::Pair;
use pest_derive::Parser;
use crate::error::NacAbeError;
use crate::utils::policy::pest::{PolicyType, PolicyValue};

#[derive(Parser)]
#[grammar = "human.policy.pest"]
pub(crate) struct HumanPolicyParser;

pub(crate) fn parse(pair: Pair<Rule>) -> Result<PolicyValue, NacAbeError> {
    match pair.as_rule() {
        Rule::content => match pair.into_inner().next() {
            Some(inner) => parse(inner),
            None => Err(NacAbeError::malformed_policy("empty policy")),
        },
        Rule::or_expr => gate(PolicyType::Or, pair),
        Rule::and_expr => gate(PolicyType::And, pair),
        Rule::negation => {
            match pair.into_inner().find(|child| child.as_rule() != Rule::not_op) {
                Some(operand) => Ok(PolicyValue::Not(Box::new(parse(operand)?))),
                None => Err(NacAbeError::malformed_policy("negation without operand")),
            }
        }
        Rule::bare => Ok(PolicyValue::String(pair.as_str().to_string())),
        Rule::quoted => match pair.into_inner().next() {
            Some(inner) => Ok(PolicyValue::String(inner.as_str().to_string())),
            None => Err(NacAbeError::malformed_policy("empty attribute")),
        },
        other => Err(NacAbeError::malformed_policy(
            &format!("unexpected token {:?}", other)
        )),
    }
}

/// `a or b or c` arrives as one pair with interleaved operators; nested
/// gates of the same type are flattened so `(a or b) or c` == `a or b or c`.
fn gate(kind: PolicyType, pair: Pair<Rule>) -> Result<PolicyValue, NacAbeError> {
    let mut children: Vec<PolicyValue> = Vec::new();
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::or_op | Rule::and_op => continue,
            _ => match parse(child)? {
                PolicyValue::Object((inner_kind, grandchildren)) if inner_kind == kind => {
                    children.extend(grandchildren)
                }
                value => children.push(value),
            },
        }
    }
    if children.len() == 1 {
        return Ok(children.remove(0));
    }
    Ok(PolicyValue::Object((kind, children)))
}
