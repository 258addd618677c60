//! Profile data model and edge normalization.
//!
//! Profile rows reach us in two shapes: already-structured JSON from the REST
//! layer, and text-encoded JSON columns from the store. Both are decoded into
//! [`RawProfile`] and normalized exactly once into [`Profile`], so the step
//! evaluator and gate only ever see clean values.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A profile field as it arrives at the deserialization boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Encoded<T> {
    /// Already the expected shape.
    Structured(T),
    /// A JSON document serialized into a string.
    Text(String),
    /// Anything else (wrong type, nested garbage).
    Other(serde_json::Value),
}

impl<T> Encoded<T>
where
    T: DeserializeOwned + Default,
{
    /// Collapse to the expected shape. Parse failures degrade to `T::default()`.
    pub fn normalize(self, field: &'static str) -> T {
        self.normalize_or(field, T::default())
    }
}

impl<T: DeserializeOwned> Encoded<T> {
    /// Collapse to the expected shape, degrading to `fallback`.
    pub fn normalize_or(self, field: &'static str, fallback: T) -> T {
        match self {
            Self::Structured(value) => value,
            Self::Text(text) => match serde_json::from_str::<T>(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(field, error = %e, "Unparseable encoded profile field, using default");
                    fallback
                }
            },
            Self::Other(value) => {
                tracing::debug!(field, value = %value, "Unexpected profile field shape, using default");
                fallback
            }
        }
    }
}

fn normalize_opt<T>(field: Option<Encoded<T>>, name: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    field.map(|f| f.normalize(name)).unwrap_or_default()
}

/// Profile record exactly as decoded, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    #[serde(default, alias = "id")]
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub onboarding_step: Option<Encoded<i64>>,
    #[serde(default)]
    pub onboarding_completed: Option<Encoded<bool>>,
    #[serde(default)]
    pub fitness_goals: Option<Encoded<BTreeSet<String>>>,
    #[serde(default)]
    pub movement_activities: Option<Encoded<BTreeMap<String, serde_json::Value>>>,
    #[serde(default)]
    pub equipment_access: Option<Encoded<BTreeSet<String>>>,
    #[serde(default)]
    pub first_week_commitment_set: Option<Encoded<bool>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalized user profile.
///
/// Stored in the `profiles` table; the set/map fields are JSON text columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProfile")]
pub struct Profile {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Persisted "current step" pointer. Not trusted blindly, see the gate.
    pub onboarding_step: i64,
    pub onboarding_completed: bool,
    pub fitness_goals: BTreeSet<String>,
    /// Activity id → preference data (frequency, intensity, ...).
    pub movement_activities: BTreeMap<String, serde_json::Value>,
    pub equipment_access: BTreeSet<String>,
    pub first_week_commitment_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            onboarding_step: 1,
            onboarding_completed: false,
            fitness_goals: BTreeSet::new(),
            movement_activities: BTreeMap::new(),
            equipment_access: BTreeSet::new(),
            first_week_commitment_set: false,
            updated_at: None,
        }
    }
}

impl Profile {
    /// Fresh profile for a user who has not answered anything yet.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        Self {
            user_id: raw.user_id,
            first_name: raw.first_name.unwrap_or_default(),
            last_name: raw.last_name.unwrap_or_default(),
            onboarding_step: raw
                .onboarding_step
                .map(|s| s.normalize_or("onboarding_step", 1))
                .unwrap_or(1),
            onboarding_completed: normalize_opt(raw.onboarding_completed, "onboarding_completed"),
            fitness_goals: normalize_opt(raw.fitness_goals, "fitness_goals"),
            movement_activities: normalize_opt(raw.movement_activities, "movement_activities"),
            equipment_access: normalize_opt(raw.equipment_access, "equipment_access"),
            first_week_commitment_set: normalize_opt(
                raw.first_week_commitment_set,
                "first_week_commitment_set",
            ),
            updated_at: raw.updated_at,
        }
    }
}

/// Partial profile write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness_goals: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_activities: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_access: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_week_commitment_set: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_profile_starts_at_step_one() {
        let p = Profile::new("u1");
        assert_eq!(p.user_id, "u1");
        assert_eq!(p.onboarding_step, 1);
        assert!(!p.onboarding_completed);
        assert!(p.fitness_goals.is_empty());
    }

    #[test]
    fn structured_payload_normalizes() {
        let p: Profile = serde_json::from_value(json!({
            "id": "u1",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "onboarding_step": 3,
            "fitness_goals": ["strength", "mobility"],
            "movement_activities": {"running": {"frequency": 3}},
            "equipment_access": ["dumbbells"],
            "first_week_commitment_set": true
        }))
        .unwrap();

        assert_eq!(p.user_id, "u1");
        assert_eq!(p.onboarding_step, 3);
        assert_eq!(p.fitness_goals.len(), 2);
        assert!(p.movement_activities.contains_key("running"));
        assert!(p.first_week_commitment_set);
    }

    #[test]
    fn text_encoded_payload_normalizes() {
        let p: Profile = serde_json::from_value(json!({
            "user_id": "u2",
            "fitness_goals": "[\"endurance\"]",
            "movement_activities": "{\"yoga\": {}}",
            "equipment_access": "[]",
            "first_week_commitment_set": "true",
            "onboarding_step": "2"
        }))
        .unwrap();

        assert!(p.fitness_goals.contains("endurance"));
        assert!(p.movement_activities.contains_key("yoga"));
        assert!(p.equipment_access.is_empty());
        assert!(p.first_week_commitment_set);
        assert_eq!(p.onboarding_step, 2);
    }

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let p: Profile = serde_json::from_value(json!({
            "user_id": "u3",
            "fitness_goals": "null",
            "movement_activities": 42,
            "equipment_access": "{not json",
            "first_week_commitment_set": "yes please",
            "onboarding_completed": null
        }))
        .unwrap();

        assert!(p.fitness_goals.is_empty());
        assert!(p.movement_activities.is_empty());
        assert!(p.equipment_access.is_empty());
        assert!(!p.first_week_commitment_set);
        assert!(!p.onboarding_completed);
        assert_eq!(p.onboarding_step, 1);
    }

    #[test]
    fn malformed_step_pointer_starts_at_step_one() {
        for step in [json!("abc"), json!("2.5"), json!({"step": 2}), json!(true)] {
            let p: Profile = serde_json::from_value(json!({
                "user_id": "u5",
                "onboarding_step": step
            }))
            .unwrap();
            assert_eq!(p.onboarding_step, 1, "step {step}");
        }
    }

    #[test]
    fn update_wire_format_omits_unset_fields() {
        let update = ProfileUpdate {
            last_name: Some("Hopper".into()),
            onboarding_step: Some(2),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"last_name": "Hopper", "onboarding_step": 2})
        );
        assert!(ProfileUpdate::default().is_empty());
    }
}
