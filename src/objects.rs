use serde::{
    Deserialize,
    Serialize,
};
use std::{
    borrow::Cow,
    fmt,
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{what} must not be empty")]
pub struct EmptyIdentifier {
    what: &'static str,
}

/// Opaque on-chain object identifier. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyIdentifier> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyIdentifier { what: "object id" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = EmptyIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = EmptyIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectId> for String {
    fn from(value: ObjectId) -> Self {
        value.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account address of the wallet that owns the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SuiAddress(String);

impl SuiAddress {
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyIdentifier> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyIdentifier { what: "address" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SuiAddress {
    type Err = EmptyIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SuiAddress {
    type Error = EmptyIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SuiAddress> for String {
    fn from(value: SuiAddress) -> Self {
        value.0
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two struct types the contract hands out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Case,
    Skin,
}

impl ObjectKind {
    pub fn struct_name(self) -> &'static str {
        match self {
            ObjectKind::Case => "Case",
            ObjectKind::Skin => "Skin",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.struct_name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Rarity::Common),
            2 => Some(Rarity::Rare),
            3 => Some(Rarity::Epic),
            4 => Some(Rarity::Legendary),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }
}

/// Label for a skin's raw rarity field.
///
/// Values outside 1..=4 render as `Rarity <n>` and a missing field renders as
/// `Unknown`, so partial query data never fails to display.
pub fn rarity_label(raw: Option<u64>) -> Cow<'static, str> {
    match raw {
        Some(n) => match Rarity::from_raw(n) {
            Some(rarity) => Cow::Borrowed(rarity.label()),
            None => Cow::Owned(format!("Rarity {n}")),
        },
        None => Cow::Borrowed("Unknown"),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Only meaningful for skins. `None` when the ledger omitted the field.
    pub rarity: Option<u64>,
}

impl OwnedObject {
    pub fn case(id: ObjectId) -> Self {
        Self {
            id,
            kind: ObjectKind::Case,
            rarity: None,
        }
    }

    pub fn skin(id: ObjectId, rarity: Option<u64>) -> Self {
        Self {
            id,
            kind: ObjectKind::Skin,
            rarity,
        }
    }

    /// Known rarity tier, if the raw value maps to one.
    pub fn rarity(&self) -> Option<Rarity> {
        self.rarity.and_then(Rarity::from_raw)
    }

    pub fn rarity_label(&self) -> Cow<'static, str> {
        rarity_label(self.rarity)
    }
}

/// Ledger-derived copy of the owner's cases and skins, in gateway order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub cases: Vec<OwnedObject>,
    pub skins: Vec<OwnedObject>,
}

impl InventorySnapshot {
    pub fn contains_case(&self, id: &ObjectId) -> bool {
        self.cases.iter().any(|c| &c.id == id)
    }

    pub fn contains_skin(&self, id: &ObjectId) -> bool {
        self.skins.iter().any(|s| &s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.skins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn rarity_label__uses_names_for_known_values() {
        let labels: Vec<_> = (1..=4).map(|n| rarity_label(Some(n))).collect();
        assert_eq!(labels, vec!["Common", "Rare", "Epic", "Legendary"]);
    }

    #[test]
    fn rarity_label__falls_back_for_values_outside_the_known_set() {
        // given
        let id = ObjectId::new("0xabc").unwrap();
        let skin = OwnedObject::skin(id, Some(7));

        // when
        let label = skin.rarity_label();

        // then
        assert_eq!(label, "Rarity 7");
    }

    #[test]
    fn rarity_label__reports_unknown_when_field_is_missing() {
        assert_eq!(rarity_label(None), "Unknown");
    }

    #[test]
    fn object_id__rejects_empty_and_whitespace() {
        assert!(ObjectId::new("").is_err());
        assert!(ObjectId::new("   ").is_err());
        assert_eq!(ObjectId::new(" 0x8 ").unwrap().as_str(), "0x8");
    }

    #[test]
    fn object_id__deserialize_rejects_empty_string() {
        let parsed: Result<ObjectId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }
}
