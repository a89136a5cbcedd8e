//! Condition definitions - the static rule data behind every condition id

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a condition in the catalog (e.g. "prone", "bleeding")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(pub String);

impl ConditionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConditionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConditionId {
    fn from(s: &str) -> Self {
        ConditionId(s.to_string())
    }
}

impl From<String> for ConditionId {
    fn from(s: String) -> Self {
        ConditionId(s)
    }
}

impl Borrow<str> for ConditionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric roll modifiers a condition contributes
///
/// Absent keys default to zero. `defense_melee` / `defense_ranged` make the
/// defense contribution context-sensitive: when either is set, the flat
/// `defense` value is ignored and the one matching the attack's range is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionModifiers {
    /// Added to attack rolls
    pub attack: i32,
    /// Added to defense rolls (unless context-sensitive)
    pub defense: i32,
    /// Defense modifier against melee attacks
    pub defense_melee: Option<i32>,
    /// Defense modifier against ranged attacks
    pub defense_ranged: Option<i32>,
    /// Added to every roll type except defense
    pub all_rolls: i32,
    /// Added to physical rolls
    pub physical: i32,
    /// Added to skill rolls
    pub skill: i32,
    /// Added to social rolls
    pub social: i32,
    /// Added to knowledge rolls
    pub knowledge: i32,
    /// Extra attack bonus while attacking from this condition (hidden)
    pub attack_from_hiding: i32,
}

impl ConditionModifiers {
    /// Whether the defense contribution depends on melee/ranged context
    pub fn has_contextual_defense(&self) -> bool {
        self.defense_melee.is_some() || self.defense_ranged.is_some()
    }
}

/// Behavioural flags consulted by the turn lifecycle and attack resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionFlags {
    /// Trauma dealt at the end of the bearer's turn
    pub end_of_turn_damage: u32,
    /// Actions lost at the start of the bearer's turn
    pub lose_actions: u32,
    pub cannot_move: bool,
    /// Attacks against the bearer ignore its defense roll
    pub is_defenseless: bool,
    pub auto_prone: bool,
    /// Removed by the caller once an attack relying on it has resolved
    pub lost_on_attack: bool,
    /// Bonus granted to anyone attacking the bearer
    pub attackers_gain_bonus: i32,
    /// Attacks against the bearer succeed without a difficulty roll
    pub attacks_are_trivial: bool,
}

/// Static definition of a condition, shared by reference from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub id: ConditionId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modifiers: ConditionModifiers,
    #[serde(default)]
    pub flags: ConditionFlags,
    /// Conditions applied alongside this one, in application order
    #[serde(default, rename = "implies")]
    pub implied_conditions: Vec<ConditionId>,
}

impl ConditionDefinition {
    /// Create a definition with no modifiers, flags or implications
    pub fn new(id: impl Into<ConditionId>, label: impl Into<String>) -> Self {
        ConditionDefinition {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            modifiers: ConditionModifiers::default(),
            flags: ConditionFlags::default(),
            implied_conditions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_modifiers(mut self, modifiers: ConditionModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_flags(mut self, flags: ConditionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn implying<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ConditionId>,
    {
        self.implied_conditions = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Whether applying this condition cascades into others
    pub fn is_compound(&self) -> bool {
        !self.implied_conditions.is_empty()
    }

    pub fn implies(&self, id: &str) -> bool {
        self.implied_conditions.iter().any(|c| c.as_str() == id)
    }
}
