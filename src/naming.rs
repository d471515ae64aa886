//! The fixed name layout every role agrees on.
use std::collections::BTreeSet;
use crate::error::NacAbeError;
use crate::ndn::Name;

pub const PUBLIC_PARAMS: &str = "PUBPARAMS";
pub const ATTRIBUTE_KEY: &str = "ATTRKEY";
pub const TOKEN: &str = "TOKEN";
pub const POLICY: &str = "POLICY";
/// Suffix of the wrapped content key next to its ciphertext.
pub const CONTENT_KEY: &str = "CK";
/// Payload a producer answers an accepted policy push with.
pub const POLICY_ACCEPTED: &str = "success";

pub fn public_params_name(authority: &Name) -> Name {
    authority.append(PUBLIC_PARAMS)
}

pub fn attribute_key_name(authority: &Name, requester: &Name) -> Name {
    authority.append(ATTRIBUTE_KEY).join(requester)
}

/// `<issuer>/TOKEN/<requester>/<attr,attr,...>` with the requester name as
/// one escaped component.
pub fn token_name(issuer: &Name, requester: &Name, attributes: &BTreeSet<String>) -> Name {
    let list: Vec<&str> = attributes.iter().map(String::as_str).collect();
    issuer
        .append(TOKEN)
        .append(requester.to_string())
        .append(list.join(","))
}

/// Splits the part of a token request name below `<issuer>/TOKEN`.
pub fn parse_token_request(suffix: &Name) -> Result<(Name, BTreeSet<String>), NacAbeError> {
    if suffix.len() != 2 {
        return Err(NacAbeError::encoding(&format!("malformed token request {}", suffix)));
    }
    let requester: Name = suffix.get(0).unwrap_or_default().parse()?;
    let attributes = suffix
        .get(1)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|attribute| !attribute.is_empty())
        .map(String::from)
        .collect();
    Ok((requester, attributes))
}

pub fn content_name(producer: &Name, content: &Name) -> Name {
    producer.join(content)
}

pub fn content_key_name(producer: &Name, content: &Name) -> Name {
    content_name(producer, content).append(CONTENT_KEY)
}

pub fn policy_name(producer: &Name, content: &Name) -> Name {
    producer.append(POLICY).join(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let aa: Name = "/aa".parse().unwrap();
        let producer: Name = "/producer".parse().unwrap();
        let consumer: Name = "/consumer1".parse().unwrap();
        let content: Name = "/data/1".parse().unwrap();
        assert_eq!(public_params_name(&aa).to_string(), "/aa/PUBPARAMS");
        assert_eq!(attribute_key_name(&aa, &consumer).to_string(), "/aa/ATTRKEY/consumer1");
        assert_eq!(content_key_name(&producer, &content).to_string(), "/producer/data/1/CK");
        assert_eq!(policy_name(&producer, &content).to_string(), "/producer/POLICY/data/1");
    }

    #[test]
    fn token_request_round_trip() {
        let issuer: Name = "/issuer".parse().unwrap();
        let consumer: Name = "/org/consumer1".parse().unwrap();
        let attributes: BTreeSet<String> = ["attr1", "attr3"].iter().map(|a| a.to_string()).collect();
        let name = token_name(&issuer, &consumer, &attributes);
        let suffix = name.strip_prefix(&issuer.append(TOKEN)).unwrap();
        assert_eq!(parse_token_request(&suffix).unwrap(), (consumer, attributes));
        assert!(parse_token_request(&"/only-one".parse().unwrap()).is_err());
    }
}
