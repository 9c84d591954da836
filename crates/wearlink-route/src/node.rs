use serde::{Deserialize, Serialize};
use wearlink_codec::{TypedValue, Value};

use crate::environment::{EnvValue, Environment};

/// Index of a node within its route, in construction order.
pub type NodeId = usize;

/// Comparison applied by a filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn holds(self, value: i128, reference: i128) -> bool {
        match self {
            Comparison::Eq => value == reference,
            Comparison::Neq => value != reference,
            Comparison::Lt => value < reference,
            Comparison::Lte => value <= reference,
            Comparison::Gt => value > reference,
            Comparison::Gte => value >= reference,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Neq => "!=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }
}

/// Arithmetic applied by a map node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl MathOp {
    pub fn apply(self, value: i128, operand: i128) -> Option<i128> {
        match self {
            MathOp::Add => value.checked_add(operand),
            MathOp::Sub => value.checked_sub(operand),
            MathOp::Mul => value.checked_mul(operand),
            MathOp::Div => value.checked_div(operand),
            MathOp::Mod => value.checked_rem(operand),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Mod => "%",
        }
    }
}

/// Data-only processing step between a source and its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformKind {
    /// Forward the value only when the comparison holds.
    Filter { op: Comparison, reference: i64 },
    /// Replace the value with `value <op> operand` as an `i64`.
    Map { op: MathOp, operand: i64 },
    /// Replace the value with the running sum kept in slot 0.
    Accumulate,
}

impl TransformKind {
    /// Run the step. `None` stops propagation to this node's children.
    ///
    /// Integer steps drop values with no integer reading (`RawBytes`).
    pub fn apply(&self, input: &TypedValue, env: &mut Environment) -> Option<TypedValue> {
        let value = input.value().as_i128()?;
        match *self {
            TransformKind::Filter { op, reference } => op
                .holds(value, i128::from(reference))
                .then(|| input.clone()),
            TransformKind::Map { op, operand } => {
                let result = op.apply(value, i128::from(operand))?;
                let result = i64::try_from(result).ok()?;
                Some(TypedValue::new(Value::Int64(result), input.timestamp()))
            }
            TransformKind::Accumulate => {
                let total = env
                    .get(0)
                    .and_then(EnvValue::as_int)
                    .map(i128::from)
                    .unwrap_or(0)
                    .saturating_add(value);
                let total = total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
                env.set(0, EnvValue::Int(total));
                Some(TypedValue::new(Value::Int64(total), input.timestamp()))
            }
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformKind::Filter { op, reference } => {
                write!(f, "filter {} {reference}", op.symbol())
            }
            TransformKind::Map { op, operand } => write!(f, "map {} {operand}", op.symbol()),
            TransformKind::Accumulate => f.write_str("accumulate"),
        }
    }
}

/// Role of a node in a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Root node fed by the route's source descriptor.
    Source,
    Transform { transform: TransformKind },
    /// Terminal node that invokes application code.
    Subscriber,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Transform { .. } => "transform",
            NodeKind::Subscriber => "subscriber",
        }
    }
}

/// One node of a route; children are listed in construction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl RouteNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;

    use super::*;

    fn sample(value: Value) -> TypedValue {
        TypedValue::new(value, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn filter_passes_matching_values() {
        let filter = TransformKind::Filter {
            op: Comparison::Gt,
            reference: 10,
        };
        let mut env = Environment::new();
        assert!(filter.apply(&sample(Value::UInt8(11)), &mut env).is_some());
        assert!(filter.apply(&sample(Value::UInt8(10)), &mut env).is_none());
        assert!(filter.apply(&sample(Value::Int8(-5)), &mut env).is_none());
    }

    #[test]
    fn map_produces_i64_and_drops_division_by_zero() {
        let mut env = Environment::new();
        let scale = TransformKind::Map {
            op: MathOp::Mul,
            operand: -3,
        };
        let out = scale.apply(&sample(Value::UInt16(7)), &mut env).unwrap();
        assert_eq!(out.value(), &Value::Int64(-21));

        let div = TransformKind::Map {
            op: MathOp::Div,
            operand: 0,
        };
        assert!(div.apply(&sample(Value::UInt16(7)), &mut env).is_none());
    }

    #[test]
    fn accumulate_keeps_running_sum_in_slot_zero() {
        let mut env = Environment::new();
        let acc = TransformKind::Accumulate;
        acc.apply(&sample(Value::UInt8(3)), &mut env);
        let out = acc.apply(&sample(Value::Int8(-1)), &mut env).unwrap();
        assert_eq!(out.value(), &Value::Int64(2));
        assert_eq!(env.get(0), Some(&EnvValue::Int(2)));
    }

    #[test]
    fn integer_steps_skip_raw_bytes() {
        let mut env = Environment::new();
        let raw = sample(Value::RawBytes(Bytes::from_static(&[1, 2])));
        assert!(TransformKind::Accumulate.apply(&raw, &mut env).is_none());
        assert!(env.is_empty());
    }

    #[test]
    fn transform_display_is_compact() {
        let filter = TransformKind::Filter {
            op: Comparison::Lte,
            reference: -2,
        };
        assert_eq!(filter.to_string(), "filter <= -2");
        assert_eq!(TransformKind::Accumulate.to_string(), "accumulate");
    }

    #[test]
    fn node_kind_serializes_with_tag() {
        let kind = NodeKind::Transform {
            transform: TransformKind::Filter {
                op: Comparison::Gte,
                reference: 4,
            },
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"transform","transform":{"type":"filter","op":"gte","reference":4}}"#
        );
    }
}
