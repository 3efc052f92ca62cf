//! Normalized sort keys for the heap batch queue.
//!
//! Keys are materialized per row with direction and null placement baked
//! in, so heap entries order correctly under plain `Ord` and the heap
//! itself stays comparator-free.

use std::cmp::Ordering;
use std::sync::Arc;

use thaw_plan::{ScanPlan, SortDirection, SortKey};
use thaw_result::{Error, Result};
use thaw_types::Value;

use crate::batch::BatchState;
use crate::ExecContext;

/// One comparable sort atom. Integer widths normalize to `i64` and float
/// widths to `f64` (exactly representable), keeping comparison total.
#[derive(Clone, Debug)]
pub(crate) enum KeyAtom {
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
}

impl KeyAtom {
    fn from_value(value: &Value) -> KeyAtom {
        match value {
            Value::Int32(v) => KeyAtom::Int(*v as i64),
            Value::Int64(v) => KeyAtom::Int(*v),
            Value::Float32(v) => KeyAtom::Float(*v as f64),
            Value::Float64(v) => KeyAtom::Float(*v),
            Value::Str(v) => KeyAtom::Str(Arc::clone(v)),
            Value::Bool(v) => KeyAtom::Bool(*v),
        }
    }

    fn order(&self, other: &KeyAtom) -> Ordering {
        match (self, other) {
            (KeyAtom::Int(a), KeyAtom::Int(b)) => a.cmp(b),
            (KeyAtom::Float(a), KeyAtom::Float(b)) => a.total_cmp(b),
            (KeyAtom::Str(a), KeyAtom::Str(b)) => a.as_ref().cmp(b.as_ref()),
            (KeyAtom::Bool(a), KeyAtom::Bool(b)) => a.cmp(b),
            // Mixed atoms cannot occur for one sort key; order arbitrarily
            // but deterministically.
            _ => self.discriminant().cmp(&other.discriminant()),
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            KeyAtom::Int(_) => 0,
            KeyAtom::Float(_) => 1,
            KeyAtom::Str(_) => 2,
            KeyAtom::Bool(_) => 3,
        }
    }
}

/// One normalized key component: null placement rank, the atom, and the
/// direction flip.
#[derive(Clone, Debug)]
pub(crate) struct KeyPart {
    rank: u8,
    atom: Option<KeyAtom>,
    invert: bool,
}

impl KeyPart {
    pub(crate) fn new(value: Option<&Value>, key: &SortKey) -> KeyPart {
        let is_null = value.is_none();
        let rank = match (is_null, key.nulls_first) {
            (true, true) => 0,
            (false, _) => 1,
            (true, false) => 2,
        };
        KeyPart {
            rank,
            atom: value.map(KeyAtom::from_value),
            invert: key.direction == SortDirection::Descending,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank.cmp(&other.rank) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (&self.atom, &other.atom) {
            (Some(a), Some(b)) => {
                let ordering = a.order(b);
                if self.invert {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

/// Full normalized key: one part per declared sort key, compared
/// lexicographically.
pub(crate) type BatchRowKey = Vec<KeyPart>;

/// Extract the key of the batch's current cursor row.
pub(crate) fn extract_key(
    state: &mut BatchState,
    keys: &[SortKey],
    plan: &ScanPlan,
    ctx: &ExecContext,
) -> Result<BatchRowKey> {
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let descriptor = plan
            .mapping
            .descriptor_for_output(key.output_position)
            .ok_or_else(|| Error::Internal("sort key over an unmapped column".into()))?;
        state.ensure_decoded(descriptor, plan, &ctx.codecs)?;
        let value = state.value_at_cursor(descriptor)?;
        parts.push(KeyPart::new(value.as_ref(), key));
    }
    Ok(parts)
}
