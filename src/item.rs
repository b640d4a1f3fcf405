//! Agent item keys.
//!
//! Monitoring agents ask for values with keys like `procinf.vmrss[java,tomcat]`:
//! the key selects the metric, the first parameter is the process name and the
//! optional second parameter is the owning user.

use crate::aggregate::{AggregationRequest, Aggregator, Metric};
use crate::error::ItemError;
use once_cell::sync::Lazy;
use regex::Regex;

/// One supported item.
#[derive(Debug, Clone, Copy)]
pub struct ItemDef {
    pub key: &'static str,
    pub metric: Metric,
    /// Parameters the agent uses when testing the item.
    pub test_params: &'static str,
    pub description: &'static str,
}

/// Supported items.
pub const ITEMS: [ItemDef; 4] = [
    ItemDef {
        key: "procinf.vmrss",
        metric: Metric::ResidentMemory,
        test_params: "bash",
        description: "Resident memory of all same-named processes",
    },
    ItemDef {
        key: "procinf.allmap",
        metric: Metric::AllMappings,
        test_params: "bash",
        description: "Size of all mapped regions of all same-named processes",
    },
    ItemDef {
        key: "procinf.rwmap",
        metric: Metric::ReadWriteMappings,
        test_params: "bash",
        description: "Size of readable and writable regions of all same-named processes",
    },
    ItemDef {
        key: "procinf.shmap",
        metric: Metric::SharedMappings,
        test_params: "bash",
        description: "Size of shared regions of all same-named processes",
    },
];

/// Looks up an item by key.
pub fn find_item(key: &str) -> Option<&'static ItemDef> {
    ITEMS.iter().find(|item| item.key == key)
}

static KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_.\-]+)(?:\[(.*)\])?$").expect("item key regex is valid")
});

/// Parsed item key with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequest {
    pub key: String,
    pub params: Vec<String>,
}

impl ItemRequest {
    /// Parses `key` or `key[p1,p2,...]`.
    pub fn parse(raw: &str) -> Result<Self, ItemError> {
        let caps = KEY_RE
            .captures(raw.trim())
            .ok_or_else(|| ItemError::MalformedKey(raw.to_string()))?;

        let key = caps[1].to_string();
        let params = match caps.get(2) {
            Some(p) => split_params(p.as_str())
                .ok_or_else(|| ItemError::MalformedKey(raw.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self { key, params })
    }

    /// Builds the aggregation request this item stands for.
    pub fn to_request(&self) -> Result<AggregationRequest, ItemError> {
        let item =
            find_item(&self.key).ok_or_else(|| ItemError::UnsupportedKey(self.key.clone()))?;

        match self.params.as_slice() {
            [name] => Ok(AggregationRequest::new(name.as_str(), None, item.metric)?),
            [name, user] => Ok(AggregationRequest::new(
                name.as_str(),
                Some(user.clone()),
                item.metric,
            )?),
            other => Err(ItemError::ParameterCount(other.len())),
        }
    }

    /// Evaluates the item against `aggregator`.
    pub fn evaluate(&self, aggregator: &Aggregator) -> Result<u64, ItemError> {
        let request = self.to_request()?;
        Ok(aggregator.aggregate(&request))
    }
}

/// Splits a bracketed parameter list.
///
/// Parameters are comma separated. Leading spaces are dropped. A parameter
/// starting with `"` runs to the next unescaped `"` and may contain commas;
/// `\"` inside it is a literal quote. Returns `None` for an unterminated
/// quote or text after a closing quote.
fn split_params(list: &str) -> Option<Vec<String>> {
    let mut params = Vec::new();
    let mut chars = list.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }

        let mut param = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        param.push('"');
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => param.push(c),
                }
            }
            if !closed {
                return None;
            }
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            match chars.peek() {
                None | Some(',') => {}
                Some(_) => return None,
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                param.push(c);
                chars.next();
            }
        }

        params.push(param);
        match chars.next() {
            Some(',') => continue,
            _ => break,
        }
    }

    Some(params)
}
