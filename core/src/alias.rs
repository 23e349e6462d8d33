//! Alias models and classification
//!
//! An alias is a mailing identity owned by the account: the bare wallet
//! address, or an ENS / .bit name that resolves to it.

use serde::{Deserialize, Serialize};

/// A mailing identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Alias identifier
    pub uuid: String,
    /// Full address, `local@domain`
    pub address: String,
    /// Whether this alias is the default sending address
    #[serde(default)]
    pub is_default: bool,
}

impl Alias {
    /// Part of the address before `@`
    pub fn local_part(&self) -> &str {
        local_part(&self.address)
    }

    /// Classify this alias
    pub fn kind(&self) -> AliasKind {
        AliasKind::classify(&self.address)
    }
}

/// Wire shape of the alias list endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasList {
    /// All aliases of the account
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

/// Kind of alias, derived from the local part of its address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    /// `0x` wallet address
    Primitive,
    /// ENS name (`*.eth`)
    EnsLike,
    /// .bit name (`*.bit`)
    BitLike,
    /// Anything else
    Unknown,
}

impl AliasKind {
    /// Classify a full address or a bare local part
    pub fn classify(address: &str) -> Self {
        let local = local_part(address);
        if is_bit_domain(local) {
            AliasKind::BitLike
        } else if is_ens_domain(local) {
            AliasKind::EnsLike
        } else if is_primitive_address(local) {
            AliasKind::Primitive
        } else {
            AliasKind::Unknown
        }
    }

    /// Whether the backend can re-scan the chain for names of this kind
    pub fn is_refreshable(&self) -> bool {
        matches!(self, AliasKind::EnsLike | AliasKind::BitLike)
    }
}

impl std::fmt::Display for AliasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AliasKind::Primitive => write!(f, "primitive"),
            AliasKind::EnsLike => write!(f, "ENS"),
            AliasKind::BitLike => write!(f, "BIT"),
            AliasKind::Unknown => write!(f, "unknown"),
        }
    }
}

fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

fn has_suffix_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() > suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// `0x` followed by 40 hex digits
pub fn is_primitive_address(s: &str) -> bool {
    let hex = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => hex,
        None => return false,
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// ENS name such as `vitalik.eth`
pub fn is_ens_domain(s: &str) -> bool {
    has_suffix_ignore_case(s, ".eth")
}

/// .bit name such as `mail3.bit`
pub fn is_bit_domain(s: &str) -> bool {
    has_suffix_ignore_case(s, ".bit")
}

/// Aliases split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedAliases {
    /// The wallet address alias
    pub primitive: Option<Alias>,
    /// ENS aliases, in input order
    pub ens: Vec<Alias>,
    /// .bit aliases, in input order
    pub bit: Vec<Alias>,
    /// Unrecognized aliases, plus any primitive alias after the first
    pub unknown: Vec<Alias>,
}

impl ClassifiedAliases {
    /// Partition `aliases` by kind.
    ///
    /// Every input alias lands in exactly one partition.
    pub fn partition(aliases: &[Alias]) -> Self {
        let mut classified = Self::default();
        for alias in aliases {
            match alias.kind() {
                AliasKind::BitLike => classified.bit.push(alias.clone()),
                AliasKind::EnsLike => classified.ens.push(alias.clone()),
                AliasKind::Primitive if classified.primitive.is_none() => {
                    classified.primitive = Some(alias.clone())
                }
                AliasKind::Primitive => {
                    tracing::warn!("Account has more than one primitive alias: {}", alias.address);
                    classified.unknown.push(alias.clone())
                }
                AliasKind::Unknown => classified.unknown.push(alias.clone()),
            }
        }
        classified
    }

    /// Aliases of one kind
    pub fn of_kind(&self, kind: AliasKind) -> Vec<&Alias> {
        match kind {
            AliasKind::Primitive => self.primitive.iter().collect(),
            AliasKind::EnsLike => self.ens.iter().collect(),
            AliasKind::BitLike => self.bit.iter().collect(),
            AliasKind::Unknown => self.unknown.iter().collect(),
        }
    }

    /// Total number of aliases across all partitions
    pub fn len(&self) -> usize {
        self.primitive.iter().count() + self.ens.len() + self.bit.len() + self.unknown.len()
    }

    /// Whether there are no aliases at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The account's aliases with the active (default) one resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasBook {
    aliases: Vec<Alias>,
    classified: ClassifiedAliases,
    active: Option<String>,
}

impl AliasBook {
    /// Build from server data.
    ///
    /// The active alias is the first one flagged default, else the first
    /// alias. Default flags are normalized so at most one is set.
    pub fn from_aliases(mut aliases: Vec<Alias>) -> Self {
        let active = aliases
            .iter()
            .find(|a| a.is_default)
            .or_else(|| aliases.first())
            .map(|a| a.uuid.clone());

        let mut seen_default = false;
        for alias in aliases.iter_mut() {
            let is_active = !seen_default && Some(&alias.uuid) == active.as_ref();
            seen_default |= is_active;
            alias.is_default = is_active;
        }

        let classified = ClassifiedAliases::partition(&aliases);
        Self {
            aliases,
            classified,
            active,
        }
    }

    /// All aliases in server order
    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// Aliases split by kind
    pub fn classified(&self) -> &ClassifiedAliases {
        &self.classified
    }

    /// Uuid of the active alias
    pub fn active_uuid(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active alias
    pub fn active(&self) -> Option<&Alias> {
        let uuid = self.active.as_deref()?;
        self.aliases.iter().find(|a| a.uuid == uuid)
    }

    /// Address mail is sent from by default
    pub fn default_address(&self) -> Option<&str> {
        self.active().map(|a| a.address.as_str())
    }

    /// Whether `uuid` belongs to this account
    pub fn contains(&self, uuid: &str) -> bool {
        self.aliases.iter().any(|a| a.uuid == uuid)
    }

    /// Copy with `uuid` as the only default alias
    pub fn with_default(&self, uuid: &str) -> Self {
        let aliases = self
            .aliases
            .iter()
            .cloned()
            .map(|mut a| {
                a.is_default = a.uuid == uuid;
                a
            })
            .collect();
        Self::from_aliases(aliases)
    }
}
