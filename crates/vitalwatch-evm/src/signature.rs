//! Event signatures and the hash → signature table.
//!
//! Signatures are written the way Solidity prints them,
//! `"Transfer(address,address,uint256)"`. A parameter may carry the
//! `indexed` keyword (and optionally a name):
//!
//! ```text
//! Transfer(address indexed from, address indexed to, uint256 value)
//! ```
//!
//! Without any `indexed` marker the signature uses [`IndexLayout::Prefix`]:
//! whatever topics a log carries are matched against the leading
//! parameters. That holds for the usual token events but not for every
//! declaration, so a signature that marks at least one parameter switches
//! to [`IndexLayout::Explicit`] and is decoded by its mask instead.

use std::collections::HashMap;

use alloy_core::dyn_abi::DynSolType;
use alloy_primitives::B256;
use vitalwatch_core::error::SignatureError;

use crate::fingerprint;

/// An EVM log carries at most four topics, one of them the signature hash.
const MAX_INDEXED: usize = 3;

/// How indexed parameters are located within the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// Indexed parameters are assumed to be the first N in declaration order,
    /// N being the number of topics after the signature hash.
    Prefix,
    /// Each parameter states whether it is indexed.
    Explicit,
}

/// One declared event parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub ty: DynSolType,
    pub indexed: bool,
    pub name: Option<String>,
}

/// A parsed event signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    name: String,
    params: Vec<ParamSpec>,
    layout: IndexLayout,
    canonical: String,
    hash: B256,
}

impl EventSignature {
    /// Parse a human-readable signature.
    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        let invalid = |reason: &str| SignatureError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let text = signature.trim();
        let open = text.find('(').ok_or_else(|| invalid("missing '('"))?;
        let inner = text[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| invalid("missing closing ')'"))?;
        let name = text[..open].trim();
        if !is_identifier(name) {
            return Err(invalid("event name is not an identifier"));
        }

        let mut params = Vec::new();
        if !inner.trim().is_empty() {
            for part in split_top_level(inner).map_err(|r| invalid(r))? {
                params.push(parse_param(part).map_err(|r| invalid(r.as_str()))?);
            }
        }

        let indexed = params.iter().filter(|p| p.indexed).count();
        let layout = if indexed > 0 {
            IndexLayout::Explicit
        } else {
            IndexLayout::Prefix
        };
        if indexed > MAX_INDEXED {
            return Err(invalid("more than 3 indexed parameters"));
        }

        let types: Vec<String> = params
            .iter()
            .map(|p| p.ty.sol_type_name().into_owned())
            .collect();
        let canonical = format!("{name}({})", types.join(","));
        let hash = fingerprint::signature_hash(&canonical);

        Ok(Self {
            name: name.to_string(),
            params,
            layout,
            canonical,
            hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn layout(&self) -> IndexLayout {
        self.layout
    }

    /// `Name(type,type,...)` with canonical type names and no markers.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// keccak-256 of [`Self::canonical`], i.e. the expected topic[0].
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Number of topics a matching log carries, when the layout says so.
    pub fn expected_topics(&self) -> Option<usize> {
        match self.layout {
            IndexLayout::Prefix => None,
            IndexLayout::Explicit => Some(1 + self.params.iter().filter(|p| p.indexed).count()),
        }
    }
}

impl std::fmt::Display for EventSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Signature hash → signature, built once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: HashMap<B256, EventSignature>,
    /// Hashes in registration order, for building topic filters.
    order: Vec<B256>,
}

impl SignatureTable {
    /// Parse every signature and index it by hash.
    ///
    /// Two inputs with the same hash (the same event written twice, perhaps
    /// with different markers) are rejected as `DuplicateSignature`.
    pub fn build<S: AsRef<str>>(signatures: &[S]) -> Result<Self, SignatureError> {
        let mut table = Self::default();
        for raw in signatures {
            let sig = EventSignature::parse(raw.as_ref())?;
            if let Some(existing) = table.entries.get(&sig.hash) {
                return Err(SignatureError::DuplicateSignature {
                    first: existing.canonical.clone(),
                    second: raw.as_ref().to_string(),
                    hash: sig.hash,
                });
            }
            table.order.push(sig.hash);
            table.entries.insert(sig.hash, sig);
        }
        Ok(table)
    }

    pub fn get(&self, hash: &B256) -> Option<&EventSignature> {
        self.entries.get(hash)
    }

    /// Signature hashes in registration order.
    pub fn hashes(&self) -> &[B256] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Split on commas that are not nested inside a tuple type.
fn split_top_level(s: &str) -> Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or("unbalanced ')'")?,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '('");
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// `<type> [indexed] [name]`
fn parse_param(part: &str) -> Result<ParamSpec, String> {
    let part = part.trim();
    if part.is_empty() {
        return Err("empty parameter".into());
    }

    // The type ends at the first whitespace outside a tuple.
    let mut depth = 0usize;
    let mut end = part.len();
    for (i, c) in part.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let (ty_str, rest) = part.split_at(end);
    let ty: DynSolType = ty_str
        .parse()
        .map_err(|e: alloy_core::dyn_abi::Error| format!("type '{ty_str}': {e}"))?;

    let mut indexed = false;
    let mut name = None;
    for word in rest.split_whitespace() {
        match word {
            "indexed" => {
                if indexed || name.is_some() {
                    return Err("misplaced 'indexed'".into());
                }
                indexed = true;
            }
            w if name.is_none() && is_identifier(w) => name = Some(w.to_string()),
            w => return Err(format!("unexpected token '{w}'")),
        }
    }

    Ok(ParamSpec { ty, indexed, name })
}
