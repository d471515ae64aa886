//! Shamir sharing of a secret along a policy tree.
//!
//! `and` gates are n-of-n, `or` gates 1-of-n. Leaves are numbered in
//! depth-first order, so an attribute that appears twice in a policy gets two
//! independent shares.
use std::collections::BTreeSet;
use rabe_bn::Fr;
use rand::Rng;
use crate::error::NacAbeError;
use crate::utils::policy::pest::{PolicyType, PolicyValue};

/// Splits `secret` into one share per policy leaf, in leaf order.
pub fn gen_shares_policy(secret: Fr, policy: &PolicyValue) -> Result<Vec<(String, Fr)>, NacAbeError> {
    let mut result: Vec<(String, Fr)> = Vec::new();
    share(secret, policy, &mut result)?;
    Ok(result)
}

fn share(secret: Fr, value: &PolicyValue, result: &mut Vec<(String, Fr)>) -> Result<(), NacAbeError> {
    match value {
        PolicyValue::String(attribute) => {
            result.push((attribute.clone(), secret));
            Ok(())
        }
        PolicyValue::Not(_) => Err(NacAbeError::malformed_policy("cannot share a secret over a negation")),
        PolicyValue::Object((kind, children)) => {
            let n = children.len();
            let k = match kind {
                PolicyType::And => n,
                PolicyType::Or => 1,
            };
            let shares = gen_shares(secret, k, n);
            for (i, child) in children.iter().enumerate() {
                share(shares[i + 1], child, result)?;
            }
            Ok(())
        }
    }
}

/// Evaluates a random polynomial of degree `k - 1` with constant term
/// `secret` at 0..=n. Index 0 holds the secret itself.
pub fn gen_shares(secret: Fr, k: usize, n: usize) -> Vec<Fr> {
    let mut shares: Vec<Fr> = Vec::new();
    if k <= n {
        let mut rng = rand::thread_rng();
        let mut a: Vec<Fr> = vec![secret];
        for _i in 1..k {
            a.push(rng.gen());
        }
        for i in 0..(n + 1) {
            shares.push(polynomial(&a, usize_to_fr(i)));
        }
    }
    shares
}

pub fn polynomial(coeff: &[Fr], x: Fr) -> Fr {
    coeff.iter().rev().fold(Fr::zero(), |acc, c| acc * x + *c)
}

pub fn usize_to_fr(value: usize) -> Fr {
    (0..value).fold(Fr::zero(), |acc, _| acc + Fr::one())
}

/// Lagrange coefficients for interpolation at 0
pub fn recover_coefficients(list: &[Fr]) -> Result<Vec<Fr>, NacAbeError> {
    let mut coeff: Vec<Fr> = Vec::new();
    for i in list {
        let mut result = Fr::one();
        for j in list {
            if i != j {
                let denominator = (*i - *j)
                    .inverse()
                    .ok_or_else(|| NacAbeError::encoding("duplicate interpolation point"))?;
                result = result * ((Fr::zero() - *j) * denominator);
            }
        }
        coeff.push(result);
    }
    Ok(coeff)
}

/// Picks a minimal set of satisfied leaves and the coefficient each share has
/// to be weighted with to recover the secret. `None` if the attribute set does
/// not satisfy the policy.
pub fn calc_pruned(
    attributes: &BTreeSet<String>,
    policy: &PolicyValue,
) -> Result<Option<Vec<(usize, Fr)>>, NacAbeError> {
    let mut next_leaf = 0usize;
    prune(attributes, policy, &mut next_leaf)
}

fn prune(
    attributes: &BTreeSet<String>,
    value: &PolicyValue,
    next_leaf: &mut usize,
) -> Result<Option<Vec<(usize, Fr)>>, NacAbeError> {
    match value {
        PolicyValue::String(attribute) => {
            let leaf = *next_leaf;
            *next_leaf += 1;
            if attributes.contains(attribute) {
                Ok(Some(vec![(leaf, Fr::one())]))
            } else {
                Ok(None)
            }
        }
        PolicyValue::Not(_) => Err(NacAbeError::malformed_policy("cannot recover a secret over a negation")),
        PolicyValue::Object((PolicyType::And, children)) => {
            let points: Vec<Fr> = (1..=children.len()).map(usize_to_fr).collect();
            let coeffs = recover_coefficients(&points)?;
            let mut all: Option<Vec<(usize, Fr)>> = Some(Vec::new());
            // every child is visited so leaf numbering stays aligned
            for (i, child) in children.iter().enumerate() {
                let sub = prune(attributes, child, next_leaf)?;
                all = match (all, sub) {
                    (Some(mut acc), Some(found)) => {
                        acc.extend(found.into_iter().map(|(leaf, c)| (leaf, c * coeffs[i])));
                        Some(acc)
                    }
                    _ => None,
                };
            }
            Ok(all)
        }
        PolicyValue::Object((PolicyType::Or, children)) => {
            let mut chosen: Option<Vec<(usize, Fr)>> = None;
            for child in children {
                let sub = prune(attributes, child, next_leaf)?;
                if chosen.is_none() {
                    chosen = sub;
                }
            }
            Ok(chosen)
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::utils::policy::pest::{parse, PolicyLanguage};

    fn set(attributes: &[&str]) -> BTreeSet<String> {
        attributes.iter().map(|a| a.to_string()).collect()
    }

    fn recover(shares: &[(String, Fr)], pruned: &[(usize, Fr)]) -> Fr {
        pruned
            .iter()
            .fold(Fr::zero(), |acc, (leaf, c)| acc + (*c * shares[*leaf].1))
    }

    #[test]
    fn test_secret_sharing_and() {
        let secret: Fr = rand::thread_rng().gen();
        let shares = gen_shares(secret, 2, 2);
        let coeff = recover_coefficients(&[usize_to_fr(1), usize_to_fr(2)]).unwrap();
        assert!(shares[0] == secret);
        assert!(coeff[0] * shares[1] + coeff[1] * shares[2] == secret);
    }

    #[test]
    fn test_secret_sharing_or() {
        let secret: Fr = rand::thread_rng().gen();
        let shares = gen_shares(secret, 1, 2);
        assert!(shares[1] == secret);
        assert!(shares[2] == secret);
    }

    #[test]
    fn test_policy_recovery() {
        let policy = parse("(A or B) and (C or (D and E)) and F", PolicyLanguage::HumanPolicy).unwrap();
        let secret: Fr = rand::thread_rng().gen();
        let shares = gen_shares_policy(secret, &policy).unwrap();
        assert_eq!(shares.len(), 6);

        let pruned = calc_pruned(&set(&["B", "D", "E", "F"]), &policy).unwrap().unwrap();
        assert!(recover(&shares, &pruned) == secret);

        assert!(calc_pruned(&set(&["A", "D", "F"]), &policy).unwrap().is_none());
    }

    #[test]
    fn test_repeated_attribute() {
        let policy = parse("(A and B) or (A and C)", PolicyLanguage::HumanPolicy).unwrap();
        let secret: Fr = rand::thread_rng().gen();
        let shares = gen_shares_policy(secret, &policy).unwrap();
        let pruned = calc_pruned(&set(&["A", "C"]), &policy).unwrap().unwrap();
        let leaves: Vec<usize> = pruned.iter().map(|(leaf, _)| *leaf).collect();
        assert_eq!(leaves, vec![2, 3]);
        assert!(recover(&shares, &pruned) == secret);
    }

    #[test]
    fn test_pruning_single_leaf() {
        let policy = parse("A", PolicyLanguage::HumanPolicy).unwrap();
        assert!(calc_pruned(&set(&["A"]), &policy).unwrap().is_some());
        assert!(calc_pruned(&set(&["B"]), &policy).unwrap().is_none());
    }
}
