// ============================================================
// Layer 4 - Batch Collator
// ============================================================
// Stacks a list of per-example records into one batch by adding
// a new leading dimension of size k (the batch size).
//
// A record comes in one of three shapes:
//
//   Tuple([a, b, c])          → Tuple([stack(a..), stack(b..), stack(c..)])
//   Mapping({"a": x, "b": y}) → Mapping({"a": stack(x..), "b": stack(y..)})
//   Single(x)                 → Stacked(stack(x..))
//
// The shape is decided ONCE per batch from the first record and
// every other record must match it exactly: same variant, same
// arity or key set, and per field the same dtype and shape.
// Anything else is a ShapeMismatch for the whole batch. An empty
// batch is an error too, because there is no first record to
// decide the shape from.
//
// Example (mapping):
//   [{"a": 1, "b": 2}, {"a": 3, "b": 4}]  →  {"a": [1, 3], "b": [2, 4]}

use std::collections::BTreeMap;

use crate::domain::error::{PipelineError, PipelineResult};

// ─── Array ────────────────────────────────────────────────────────────────────
/// Flat element storage of an [`Array`].
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Int(Vec<i64>),
    Float(Vec<f32>),
}

impl Values {
    fn len(&self) -> usize {
        match self {
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
        }
    }

    fn dtype(&self) -> &'static str {
        match self {
            Values::Int(_) => "int",
            Values::Float(_) => "float",
        }
    }
}

/// A dense numeric array in row-major order. Scalars have shape `[]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape:  Vec<usize>,
    values: Values,
}

impl Array {
    /// Panics if the element count does not match the shape.
    pub fn new(shape: Vec<usize>, values: Values) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            values.len(),
            "array shape {:?} does not match {} elements",
            shape,
            values.len()
        );
        Self { shape, values }
    }

    pub fn int(v: i64) -> Self {
        Self::new(Vec::new(), Values::Int(vec![v]))
    }

    pub fn float(v: f32) -> Self {
        Self::new(Vec::new(), Values::Float(vec![v]))
    }

    pub fn ints(v: Vec<i64>) -> Self {
        Self::new(vec![v.len()], Values::Int(v))
    }

    pub fn floats(v: Vec<f32>) -> Self {
        Self::new(vec![v.len()], Values::Float(v))
    }

    pub fn int_tensor(shape: Vec<usize>, v: Vec<i64>) -> Self {
        Self::new(shape, Values::Int(v))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match &self.values {
            Values::Int(v) => Some(v),
            Values::Float(_) => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.values {
            Values::Float(v) => Some(v),
            Values::Int(_) => None,
        }
    }

    pub fn into_values(self) -> Values {
        self.values
    }
}

/// Stack same-shaped arrays along a new leading axis.
///
/// `field` names the slot in error messages.
fn stack(arrays: Vec<Array>, field: &str) -> PipelineResult<Array> {
    let mut arrays = arrays.into_iter();
    let first = arrays.next().ok_or(PipelineError::EmptyBatch)?;

    let inner = first.shape.clone();
    let mut count = 1usize;
    let mut values = first.values;

    for (i, a) in arrays.enumerate() {
        let index = i + 1;
        if a.shape != inner {
            return Err(PipelineError::shape_mismatch(index, format!(
                "field '{}' has shape {:?}, expected {:?}",
                field, a.shape, inner
            )));
        }
        match (&mut values, a.values) {
            (Values::Int(acc), Values::Int(v)) => acc.extend(v),
            (Values::Float(acc), Values::Float(v)) => acc.extend(v),
            (acc, other) => {
                return Err(PipelineError::shape_mismatch(index, format!(
                    "field '{}' is {}, expected {}",
                    field, other.dtype(), acc.dtype()
                )));
            }
        }
        count += 1;
    }

    let mut shape = Vec::with_capacity(inner.len() + 1);
    shape.push(count);
    shape.extend(inner);
    Ok(Array { shape, values })
}

// ─── Record / Batch ───────────────────────────────────────────────────────────
/// One example, in one of the three supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Tuple(Vec<Array>),
    Mapping(BTreeMap<String, Array>),
    Single(Array),
}

impl Record {
    pub fn mapping<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Array)>,
    {
        Record::Mapping(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn kind(&self) -> &'static str {
        match self {
            Record::Tuple(_) => "tuple",
            Record::Mapping(_) => "mapping",
            Record::Single(_) => "single array",
        }
    }
}

/// The collated result. Its variant always mirrors the records'.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Tuple(Vec<Array>),
    Mapping(BTreeMap<String, Array>),
    Stacked(Array),
}

impl Batch {
    /// Remove and return a mapping field.
    pub fn take(&mut self, key: &str) -> PipelineResult<Array> {
        match self {
            Batch::Mapping(fields) => fields
                .remove(key)
                .ok_or_else(|| PipelineError::batch_field(key, "not present")),
            Batch::Tuple(_) => Err(PipelineError::batch_field(key, "requested from a tuple batch")),
            Batch::Stacked(_) => Err(PipelineError::batch_field(key, "requested from a single-array batch")),
        }
    }
}

/// The dispatch branch, fixed by the first record.
enum Layout {
    Tuple(usize),
    Mapping(Vec<String>),
    Single,
}

/// Collate `records` into one batch.
pub fn collate(records: Vec<Record>) -> PipelineResult<Batch> {
    let first = records.first().ok_or(PipelineError::EmptyBatch)?;
    let layout = match first {
        Record::Tuple(fields) => Layout::Tuple(fields.len()),
        Record::Mapping(fields) => Layout::Mapping(fields.keys().cloned().collect()),
        Record::Single(_) => Layout::Single,
    };
    let first_kind = first.kind();

    match layout {
        Layout::Tuple(arity) => {
            let mut columns: Vec<Vec<Array>> = (0..arity).map(|_| Vec::with_capacity(records.len())).collect();
            for (index, record) in records.into_iter().enumerate() {
                let fields = match record {
                    Record::Tuple(fields) => fields,
                    other => return Err(mixed_kinds(index, first_kind, &other)),
                };
                if fields.len() != arity {
                    return Err(PipelineError::shape_mismatch(index, format!(
                        "tuple has {} fields, expected {}", fields.len(), arity
                    )));
                }
                for (column, field) in columns.iter_mut().zip(fields) {
                    column.push(field);
                }
            }
            let stacked = columns
                .into_iter()
                .enumerate()
                .map(|(pos, column)| stack(column, &pos.to_string()))
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok(Batch::Tuple(stacked))
        }

        Layout::Mapping(keys) => {
            let mut columns: BTreeMap<String, Vec<Array>> = keys
                .iter()
                .map(|k| (k.clone(), Vec::with_capacity(records.len())))
                .collect();
            for (index, record) in records.into_iter().enumerate() {
                let fields = match record {
                    Record::Mapping(fields) => fields,
                    other => return Err(mixed_kinds(index, first_kind, &other)),
                };
                if fields.len() != keys.len() || !fields.keys().eq(keys.iter()) {
                    let found: Vec<&String> = fields.keys().collect();
                    return Err(PipelineError::shape_mismatch(index, format!(
                        "keys {:?} differ from {:?}", found, keys
                    )));
                }
                for (key, field) in fields {
                    if let Some(column) = columns.get_mut(&key) {
                        column.push(field);
                    }
                }
            }
            let stacked = columns
                .into_iter()
                .map(|(key, column)| stack(column, &key).map(|a| (key, a)))
                .collect::<PipelineResult<BTreeMap<_, _>>>()?;
            Ok(Batch::Mapping(stacked))
        }

        Layout::Single => {
            let arrays = records
                .into_iter()
                .enumerate()
                .map(|(index, record)| match record {
                    Record::Single(a) => Ok(a),
                    other => Err(mixed_kinds(index, first_kind, &other)),
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok(Batch::Stacked(stack(arrays, "value")?))
        }
    }
}

fn mixed_kinds(index: usize, expected: &str, found: &Record) -> PipelineError {
    PipelineError::shape_mismatch(index, format!(
        "record is a {}, batch started with a {}", found.kind(), expected
    ))
}
