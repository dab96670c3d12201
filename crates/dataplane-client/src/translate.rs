//! C4 — Model Translator: reshapes `metadata` between the unified model's
//! flat form and the wire schemas' nested form, and selects a version tier
//! for decoding.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;

/// The three model tiers the wire schemas fall into, keyed purely by minor
/// version (edition does not affect model shape — only dispatch routing
/// does, per §4.4's "select a target type by minor (≥2, ≥1, else 0)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    V0,
    V1,
    V2,
}

impl ModelTier {
    pub fn for_minor(minor: u8) -> Self {
        if minor >= 2 {
            ModelTier::V2
        } else if minor >= 1 {
            ModelTier::V1
        } else {
            ModelTier::V0
        }
    }
}

/// Serialize a unified model value to neutral JSON bytes, reshaping
/// `metadata` from `{k: v}` to `{k: {value: v}}`. Bytes are unchanged if no
/// `metadata` key is present.
pub fn to_neutral_json<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    let mut json = serde_json::to_value(value).map_err(|e| Error::Dispatch(format!("serializing model: {e}")))?;
    reshape_metadata_to_wire(&mut json);
    serde_json::to_vec(&json).map_err(|e| Error::Dispatch(format!("encoding model: {e}")))
}

/// Deserialize neutral JSON bytes into a version-specific model `T`. The
/// `tier` parameter documents which of the three model shapes `T` is
/// expected to correspond to; this crate trusts the caller to supply a `T`
/// matching `tier` (there is no dynamic type selection to perform here once
/// `T` is concrete).
pub fn from_neutral_json<T: DeserializeOwned>(bytes: &[u8], _tier: ModelTier) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|e| Error::Dispatch(format!("decoding model: {e}")))
}

/// `{key: value}` -> `{key: {value: value}}`, in place. No-op if `metadata`
/// is absent or not an object.
fn reshape_metadata_to_wire(json: &mut Value) {
    let Some(obj) = json.as_object_mut() else { return };
    let Some(metadata) = obj.get_mut("metadata") else { return };
    let Some(flat) = metadata.as_object() else { return };

    let nested: serde_json::Map<String, Value> = flat
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::json!({ "value": v })))
        .collect();
    *metadata = Value::Object(nested);
}

/// The reverse of [`reshape_metadata_to_wire`], for reads: `{key: {value:
/// value}}` -> `{key: value}`.
pub fn reshape_metadata_to_client(json: &mut Value) {
    let Some(obj) = json.as_object_mut() else { return };
    let Some(metadata) = obj.get_mut("metadata") else { return };
    let Some(nested) = metadata.as_object() else { return };

    let flat: serde_json::Map<String, Value> = nested
        .iter()
        .map(|(k, v)| {
            let inner = v.get("value").cloned().unwrap_or(Value::Null);
            (k.clone(), inner)
        })
        .collect();
    *metadata = Value::Object(flat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_tier_selection_matches_minor_thresholds() {
        assert_eq!(ModelTier::for_minor(0), ModelTier::V0);
        assert_eq!(ModelTier::for_minor(1), ModelTier::V1);
        assert_eq!(ModelTier::for_minor(2), ModelTier::V2);
        assert_eq!(ModelTier::for_minor(5), ModelTier::V2);
    }

    #[test]
    fn serialize_reshapes_flat_metadata_to_nested() {
        let value = json!({ "name": "web", "metadata": { "owner": "team-a", "tier": "1" } });
        let bytes = to_neutral_json(&value).unwrap();
        let reshaped: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reshaped["metadata"]["owner"]["value"], "team-a");
        assert_eq!(reshaped["metadata"]["tier"]["value"], "1");
        assert_eq!(reshaped["name"], "web");
    }

    #[test]
    fn serialize_is_unchanged_without_metadata_key() {
        let value = json!({ "name": "web" });
        let bytes = to_neutral_json(&value).unwrap();
        let reshaped: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reshaped, value);
    }

    #[test]
    fn metadata_round_trips_through_both_reshapes() {
        let original = json!({ "owner": "team-a", "tier": "1" });
        let mut wire = json!({ "name": "web", "metadata": original.clone() });
        reshape_metadata_to_wire(&mut wire);
        reshape_metadata_to_client(&mut wire);
        assert_eq!(wire["metadata"], original);
    }
}
