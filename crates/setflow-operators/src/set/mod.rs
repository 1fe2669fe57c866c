//! Streaming set engine backing INTERSECT / EXCEPT.
//!
//! The engine accumulates composite keys from one stream (`insert`) and
//! then answers membership for another (`contains`). Its encoding is picked
//! once, the first time either call needs it, from the key column types.
//! Until then the engine is empty and every lookup misses.

mod encode;
pub mod method;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use setflow_core::budget::{BudgetGuard, MemoryBudget};
use setflow_core::schema::DataType;
use setflow_core::types::{RowBatch, Scalar};
use setflow_mem::{BudgetGuardImpl, MemoryBudgetImpl};

use crate::keys::KeySpec;
use crate::traits::OpError;

use encode::{hashed_row, key_bytes, key_u64, pack_row, packed_u128, packed_u256, MAX_PACKED};
pub use method::{choose_method, SetMethod};
use method::FixedLayout;

const BUDGET_TAG: &str = "set_engine";

/// Which left rows survive a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetMode {
    /// Keep rows whose key was seen.
    Intersect,
    /// Keep rows whose key was not seen.
    Except,
}

impl SetMode {
    /// Apply the mode to one membership result.
    pub fn keep(self, found: bool) -> bool {
        match self {
            SetMode::Intersect => found,
            SetMode::Except => !found,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SetMode::Intersect => "INTERSECT",
            SetMode::Except => "EXCEPT",
        }
    }
}

impl fmt::Display for SetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

type FastSet<T> = HashSet<T, ahash::RandomState>;

fn fast_set<T>() -> FastSet<T> {
    HashSet::with_hasher(ahash::RandomState::new())
}

/// Storage for one chosen method.
enum SetVariant {
    Unit {
        seen: bool,
    },
    Key64 {
        keys: FastSet<u64>,
    },
    KeyString {
        keys: FastSet<Box<[u8]>>,
        has_null: bool,
    },
    Keys128 {
        layout: FixedLayout,
        keys: FastSet<u128>,
    },
    Keys256 {
        layout: FixedLayout,
        keys: FastSet<[u64; 4]>,
    },
    Hashed {
        keys: FastSet<u128>,
    },
}

/// What one `insert` pass added.
#[derive(Debug, Default, Clone, Copy)]
struct Added {
    keys: usize,
    bytes: usize,
}

impl SetVariant {
    fn new(method: SetMethod, spec: &KeySpec) -> Result<Self, OpError> {
        let layout = || {
            FixedLayout::new(spec)
                .ok_or_else(|| OpError::invariant(format!("{method} chosen for variable-width keys")))
        };
        Ok(match method {
            SetMethod::Unit => SetVariant::Unit { seen: false },
            SetMethod::Key64 => SetVariant::Key64 { keys: fast_set() },
            SetMethod::KeyString => SetVariant::KeyString {
                keys: fast_set(),
                has_null: false,
            },
            SetMethod::Keys128 => SetVariant::Keys128 {
                layout: layout()?,
                keys: fast_set(),
            },
            SetMethod::Keys256 => SetVariant::Keys256 {
                layout: layout()?,
                keys: fast_set(),
            },
            SetMethod::Hashed => SetVariant::Hashed { keys: fast_set() },
        })
    }

    fn method(&self) -> SetMethod {
        match self {
            SetVariant::Unit { .. } => SetMethod::Unit,
            SetVariant::Key64 { .. } => SetMethod::Key64,
            SetVariant::KeyString { .. } => SetMethod::KeyString,
            SetVariant::Keys128 { .. } => SetMethod::Keys128,
            SetVariant::Keys256 { .. } => SetMethod::Keys256,
            SetVariant::Hashed { .. } => SetMethod::Hashed,
        }
    }

    fn len(&self) -> usize {
        match self {
            SetVariant::Unit { seen } => usize::from(*seen),
            SetVariant::Key64 { keys } => keys.len(),
            SetVariant::KeyString { keys, has_null } => keys.len() + usize::from(*has_null),
            SetVariant::Keys128 { keys, .. } => keys.len(),
            SetVariant::Keys256 { keys, .. } => keys.len(),
            SetVariant::Hashed { keys } => keys.len(),
        }
    }

    fn insert(&mut self, spec: &KeySpec, views: &[&[Scalar]], rows: usize) -> Result<Added, OpError> {
        let entry = self.method().entry_bytes();
        let mut added = Added::default();
        let mut buf = [0u8; MAX_PACKED];
        match self {
            SetVariant::Unit { seen } => {
                if rows > 0 && !*seen {
                    *seen = true;
                    added.keys = 1;
                }
            }
            SetVariant::Key64 { keys } => {
                let (col, data_type) = single(spec, views)?;
                for v in col {
                    if keys.insert(key_u64(v, data_type)?) {
                        added.keys += 1;
                    }
                }
            }
            SetVariant::KeyString { keys, has_null } => {
                let (col, data_type) = single(spec, views)?;
                for v in col {
                    match key_bytes(v, data_type)? {
                        None => {
                            if !*has_null {
                                *has_null = true;
                                added.keys += 1;
                            }
                        }
                        Some(bytes) => {
                            if !keys.contains(bytes) {
                                keys.insert(bytes.into());
                                added.keys += 1;
                                added.bytes += bytes.len();
                            }
                        }
                    }
                }
            }
            SetVariant::Keys128 { layout, keys } => {
                for row in 0..rows {
                    pack_row(layout, views, row, &mut buf)?;
                    if keys.insert(packed_u128(&buf)) {
                        added.keys += 1;
                    }
                }
            }
            SetVariant::Keys256 { layout, keys } => {
                for row in 0..rows {
                    pack_row(layout, views, row, &mut buf)?;
                    if keys.insert(packed_u256(&buf)) {
                        added.keys += 1;
                    }
                }
            }
            SetVariant::Hashed { keys } => {
                let mut scratch = Vec::new();
                for row in 0..rows {
                    if keys.insert(hashed_row(spec.columns(), views, row, &mut scratch)?) {
                        added.keys += 1;
                    }
                }
            }
        }
        added.bytes += added.keys * entry;
        Ok(added)
    }

    fn probe(
        &self,
        spec: &KeySpec,
        views: &[&[Scalar]],
        rows: usize,
        mode: SetMode,
        mask: &mut Vec<bool>,
    ) -> Result<usize, OpError> {
        let mut selected = 0;
        let mut push = |found: bool| {
            let keep = mode.keep(found);
            mask.push(keep);
            if keep {
                selected += 1;
            }
        };
        let mut buf = [0u8; MAX_PACKED];
        match self {
            SetVariant::Unit { seen } => {
                for _ in 0..rows {
                    push(*seen);
                }
            }
            SetVariant::Key64 { keys } => {
                let (col, data_type) = single(spec, views)?;
                for v in col {
                    push(keys.contains(&key_u64(v, data_type)?));
                }
            }
            SetVariant::KeyString { keys, has_null } => {
                let (col, data_type) = single(spec, views)?;
                for v in col {
                    let found = match key_bytes(v, data_type)? {
                        None => *has_null,
                        Some(bytes) => keys.contains(bytes),
                    };
                    push(found);
                }
            }
            SetVariant::Keys128 { layout, keys } => {
                for row in 0..rows {
                    pack_row(layout, views, row, &mut buf)?;
                    push(keys.contains(&packed_u128(&buf)));
                }
            }
            SetVariant::Keys256 { layout, keys } => {
                for row in 0..rows {
                    pack_row(layout, views, row, &mut buf)?;
                    push(keys.contains(&packed_u256(&buf)));
                }
            }
            SetVariant::Hashed { keys } => {
                let mut scratch = Vec::new();
                for row in 0..rows {
                    push(keys.contains(&hashed_row(spec.columns(), views, row, &mut scratch)?));
                }
            }
        }
        Ok(selected)
    }
}

fn single<'a>(
    spec: &KeySpec,
    views: &[&'a [Scalar]],
) -> Result<(&'a [Scalar], DataType), OpError> {
    match (spec.columns(), views) {
        ([key], [col]) => Ok((*col, key.data_type)),
        _ => Err(OpError::invariant(format!(
            "single-key method used with {} key columns",
            views.len()
        ))),
    }
}

/// Hash-based accumulator of composite keys.
pub struct SetEngine {
    keys: KeySpec,
    variant: Option<SetVariant>,
    guard: Option<BudgetGuardImpl>,
}

impl SetEngine {
    pub fn new(keys: KeySpec) -> Self {
        Self {
            keys,
            variant: None,
            guard: None,
        }
    }

    /// Charge the engine's growth against `budget`.
    pub fn with_budget(mut self, budget: &MemoryBudgetImpl) -> Self {
        self.guard = budget.try_acquire(0, BUDGET_TAG);
        self
    }

    pub fn key_spec(&self) -> &KeySpec {
        &self.keys
    }

    /// The chosen encoding, `None` while the engine is still empty.
    pub fn method(&self) -> Option<SetMethod> {
        self.variant.as_ref().map(SetVariant::method)
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.variant.as_ref().map(SetVariant::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged to the memory budget.
    pub fn charged_bytes(&self) -> usize {
        self.guard.as_ref().map(|g| g.bytes()).unwrap_or(0)
    }

    fn init_variant(&mut self) -> Result<(), OpError> {
        if self.variant.is_none() {
            let method = choose_method(&self.keys);
            trace!(method = %method, key_columns = self.keys.len(), "set method chosen");
            self.variant = Some(SetVariant::new(method, &self.keys)?);
        }
        Ok(())
    }

    /// Add every row's key. Returns how many keys were new.
    pub fn insert(&mut self, batch: &RowBatch) -> Result<usize, OpError> {
        self.init_variant()?;
        let views = self.keys.views(batch)?;
        let variant = self
            .variant
            .as_mut()
            .ok_or_else(|| OpError::invariant("set variant missing after init"))?;
        let added = variant.insert(&self.keys, &views, batch.num_rows())?;
        if let Some(guard) = self.guard.as_mut() {
            guard.grow(added.bytes)?;
        }
        Ok(added.keys)
    }

    /// Per-row membership adjusted by `mode`, plus the number of rows kept.
    pub fn contains(&mut self, batch: &RowBatch, mode: SetMode) -> Result<(Vec<bool>, usize), OpError> {
        self.init_variant()?;
        let views = self.keys.views(batch)?;
        let rows = batch.num_rows();
        let variant = self
            .variant
            .as_ref()
            .ok_or_else(|| OpError::invariant("set variant missing after init"))?;
        let mut mask = Vec::with_capacity(rows);
        let selected = variant.probe(&self.keys, &views, rows, mode, &mut mask)?;
        Ok((mask, selected))
    }
}

impl fmt::Debug for SetEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetEngine")
            .field("keys", &self.keys)
            .field("method", &self.method())
            .field("len", &self.len())
            .field("charged_bytes", &self.charged_bytes())
            .finish()
    }
}
