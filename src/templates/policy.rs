//! Override policies attached to workflow templates and their steps.
//!
//! A derived workflow may only change the props and configuration keys its
//! template allows. Both policies are built once from template data and are
//! immutable afterwards.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prop names a step may override when it is not constrained by a template
pub const STEP_PROPS: [&str; 3] = ["title", "desc", "skippable"];

/// How prop names are compared against the allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyTransform {
    /// Names must match exactly
    Verbatim,
    /// Case-insensitive, ignoring `_` and `-` (so `instance_ttl` matches `instanceTtl`)
    #[default]
    Normalized,
}

impl KeyTransform {
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyTransform::Verbatim => key.to_string(),
            KeyTransform::Normalized => key
                .chars()
                .filter(|c| *c != '_' && *c != '-')
                .flat_map(char::to_lowercase)
                .collect(),
        }
    }
}

/// Serialized shape of [`PropsOverrideOption`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropsOverrideOptionDef {
    #[serde(default)]
    allowed: Vec<String>,
    #[serde(default)]
    transform: KeyTransform,
    #[serde(default)]
    allow_steps_order_change: bool,
}

/// Which props a derived entity may change relative to its template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "PropsOverrideOptionDef", into = "PropsOverrideOptionDef")]
pub struct PropsOverrideOption {
    allowed: Vec<String>,
    transform: KeyTransform,
    allow_steps_order_change: bool,
    normalized: BTreeSet<String>,
}

impl From<PropsOverrideOptionDef> for PropsOverrideOption {
    fn from(def: PropsOverrideOptionDef) -> Self {
        let normalized = def.allowed.iter().map(|k| def.transform.apply(k)).collect();
        Self {
            allowed: def.allowed,
            transform: def.transform,
            allow_steps_order_change: def.allow_steps_order_change,
            normalized,
        }
    }
}

impl From<PropsOverrideOption> for PropsOverrideOptionDef {
    fn from(option: PropsOverrideOption) -> Self {
        Self {
            allowed: option.allowed,
            transform: option.transform,
            allow_steps_order_change: option.allow_steps_order_change,
        }
    }
}

impl PropsOverrideOption {
    pub fn new<I, S>(allowed: I, transform: KeyTransform) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropsOverrideOptionDef {
            allowed: allowed.into_iter().map(Into::into).collect(),
            transform,
            allow_steps_order_change: false,
        }
        .into()
    }

    pub fn with_steps_order_change(mut self, allow: bool) -> Self {
        self.allow_steps_order_change = allow;
        self
    }

    /// Policy given to steps that are not part of the parent template
    pub fn permissive_step() -> Self {
        Self::new(STEP_PROPS, KeyTransform::Normalized)
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.normalized.contains(&self.transform.apply(key))
    }

    pub fn allows_steps_order_change(&self) -> bool {
        self.allow_steps_order_change
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Serialized shape of [`ConfigOverrideOption`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigOverrideOptionDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    allow_all_except_defaulted: bool,
}

/// Which configuration keys a derived step may change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigOverrideOptionDef", into = "ConfigOverrideOptionDef")]
pub enum ConfigOverrideOption {
    /// Only the listed keys may change
    AllowList(BTreeSet<String>),
    /// Keys with a non-null default are locked; every other key is free
    AllowAllExceptDefaulted,
}

impl Default for ConfigOverrideOption {
    fn default() -> Self {
        ConfigOverrideOption::AllowList(BTreeSet::new())
    }
}

impl TryFrom<ConfigOverrideOptionDef> for ConfigOverrideOption {
    type Error = String;

    fn try_from(def: ConfigOverrideOptionDef) -> Result<Self, Self::Error> {
        match (def.allowed, def.allow_all_except_defaulted) {
            (Some(_), true) => Err(
                "configOverrideOption cannot combine 'allowed' with 'allowAllExceptDefaulted'"
                    .to_string(),
            ),
            (Some(allowed), false) => Ok(ConfigOverrideOption::AllowList(
                allowed.into_iter().collect(),
            )),
            (None, true) => Ok(ConfigOverrideOption::AllowAllExceptDefaulted),
            (None, false) => Ok(ConfigOverrideOption::default()),
        }
    }
}

impl From<ConfigOverrideOption> for ConfigOverrideOptionDef {
    fn from(option: ConfigOverrideOption) -> Self {
        match option {
            ConfigOverrideOption::AllowList(allowed) => Self {
                allowed: Some(allowed.into_iter().collect()),
                allow_all_except_defaulted: false,
            },
            ConfigOverrideOption::AllowAllExceptDefaulted => Self {
                allowed: None,
                allow_all_except_defaulted: true,
            },
        }
    }
}

impl ConfigOverrideOption {
    pub fn allow_list<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigOverrideOption::AllowList(keys.into_iter().map(Into::into).collect())
    }

    /// Whether `key` may differ from the template `defaults`
    pub fn is_allowed(&self, key: &str, defaults: &Map<String, Value>) -> bool {
        match self {
            ConfigOverrideOption::AllowList(allowed) => allowed.contains(key),
            ConfigOverrideOption::AllowAllExceptDefaulted => {
                // Null and "" defaults count as unset
                defaults
                    .get(key)
                    .is_none_or(|value| value.is_null() || value.as_str() == Some(""))
            }
        }
    }
}
