use bytes::Bytes;
use serde::{Deserialize, Serialize};
use wearlink_codec::TypedValue;

/// Data a subscriber can keep between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EnvValue {
    Bool(bool),
    Int(i64),
    #[serde(rename = "uint")]
    UInt(u64),
    Text(String),
    Bytes(Bytes),
    Sample(TypedValue),
}

impl EnvValue {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            EnvValue::Int(v) => Some(v),
            EnvValue::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_sample(&self) -> Option<&TypedValue> {
        match self {
            EnvValue::Sample(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EnvValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Indexed storage slots attached to one route node.
///
/// Slots are created on first write; reading an unset slot yields `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    slots: Vec<Option<EnvValue>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment with `count` empty slots.
    pub fn with_slots(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    pub fn from_slots(slots: Vec<Option<EnvValue>>) -> Self {
        Self { slots }
    }

    pub fn get(&self, index: usize) -> Option<&EnvValue> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Store a value, growing the slot table if needed.
    pub fn set(&mut self, index: usize, value: EnvValue) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    pub fn take(&mut self, index: usize) -> Option<EnvValue> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Number of slots, set or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<EnvValue>] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_grows_and_get_reads_back() {
        let mut env = Environment::new();
        env.set(2, EnvValue::Int(7));
        assert_eq!(env.len(), 3);
        assert_eq!(env.get(0), None);
        assert_eq!(env.get(2).and_then(EnvValue::as_int), Some(7));
        assert_eq!(env.take(2), Some(EnvValue::Int(7)));
        assert_eq!(env.get(2), None);
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn serializes_as_slot_array() {
        let mut env = Environment::with_slots(2);
        env.set(1, EnvValue::Bytes(Bytes::from_static(&[0x07, 0x30])));
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"[null,{"type":"bytes","value":[7,48]}]"#);
        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
