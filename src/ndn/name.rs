use std::{
    fmt::{Display, Formatter, Result as FormatResult},
    str::FromStr,
};
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;

/// A hierarchical name: an ordered list of opaque components.
///
/// The URI form separates components with `/`; a component containing `/`
/// or `%` is percent-escaped, so any name survives `to_string` and `parse`.
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug, Default)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    pub fn new() -> Name {
        Name { components: Vec::new() }
    }

    pub fn from_components<I, S>(components: I) -> Name
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Name { components: components.into_iter().map(Into::into).collect() }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Returns a copy with one more component.
    pub fn append<S: Into<String>>(&self, component: S) -> Name {
        let mut name = self.clone();
        name.components.push(component.into());
        name
    }

    /// Returns a copy with all components of `suffix` appended.
    pub fn join(&self, suffix: &Name) -> Name {
        let mut name = self.clone();
        name.components.extend(suffix.components.iter().cloned());
        name
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    /// The components of `self` after `prefix`, if `prefix` is one.
    pub fn strip_prefix(&self, prefix: &Name) -> Option<Name> {
        if prefix.is_prefix_of(self) {
            Some(Name::from_components(self.components[prefix.len()..].iter().cloned()))
        } else {
            None
        }
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace('/', "%2F")
}

fn unescape(component: &str) -> Result<String, NacAbeError> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(position) = rest.find('%') {
        out.push_str(&rest[..position]);
        let code = rest.get(position + 1..position + 3).unwrap_or("");
        match code {
            "25" => out.push('%'),
            "2F" | "2f" => out.push('/'),
            _ => return Err(NacAbeError::encoding(&format!("bad escape in name component {}", component))),
        }
        rest = &rest[position + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

impl FromStr for Name {
    type Err = NacAbeError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let components = uri
            .split('/')
            .filter(|component| !component.is_empty())
            .map(unescape)
            .collect::<Result<Vec<String>, NacAbeError>>()?;
        Ok(Name { components })
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", escape(component))?;
        }
        Ok(())
    }
}
