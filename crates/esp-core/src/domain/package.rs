//! Package configuration: which rule groups and tasks run for an event.
//!
//! ```json
//! {
//!   "manager": "shop_manager",
//!   "events": {
//!     "Purchase": {
//!       "rules": {
//!         "loyalty": {
//!           "rule": {"service": "business_rule"},
//!           "criteria": {"['amount']": ["value > 100 ? 5 : 0", "value > 10 ? 1 : 0"]},
//!           "tasks": {
//!             "notify": {"service": "mailer", "method": "service.send(properties['email'], result)"}
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Rule groups, criteria and tasks keep the order they were declared in.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key of the built-in scoring capability.
pub const BUSINESS_RULE: &str = "business_rule";

/// Key of the built-in property mapping capability.
pub const DATA_MAPPER: &str = "data_mapper";

/// A string-keyed map that preserves declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Which rule capability scores a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub service: String,
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            service: BUSINESS_RULE.to_string(),
        }
    }
}

/// One follow-up action of a rule group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task service bound as `service` while the method expression runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Expression evaluated to run the task; its value is the task output.
    pub method: String,
}

/// A named set of scoring criteria plus follow-up tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupConfig {
    #[serde(default)]
    pub rule: RuleSpec,

    /// Property path to its ordered expressions (or target paths for the mapper).
    #[serde(default)]
    pub criteria: OrderedMap<Vec<String>>,

    #[serde(default)]
    pub tasks: OrderedMap<TaskConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default)]
    pub rules: OrderedMap<RuleGroupConfig>,
}

/// Configuration for every event a package owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub events: BTreeMap<String, EventConfig>,

    /// ESP manager that post-processes this package's events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
}

impl PackageConfig {
    /// Rule groups configured for `event_name`, in declaration order.
    pub fn rule_groups(&self, event_name: &str) -> Option<&OrderedMap<RuleGroupConfig>> {
        self.events.get(event_name).map(|e| &e.rules)
    }
}
