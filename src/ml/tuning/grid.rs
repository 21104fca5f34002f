use std::collections::BTreeMap;

use serde::Serialize;

use super::TuneError;
use crate::ml::params::{ParamSet, ParamValue};

/// Ordered hyperparameter dimensions whose Cartesian product is searched.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParamGrid {
    dims: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dimension; a repeated name replaces the earlier values in place.
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.add(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn add(&mut self, name: &str, values: Vec<ParamValue>) {
        match self.dims.iter_mut().find(|(existing, _)| existing == name) {
            Some(dim) => dim.1 = values,
            None => self.dims.push((name.to_string(), values)),
        }
    }

    /// Grid from a name-sorted map, as read from TOML.
    pub fn from_map(map: &BTreeMap<String, Vec<ParamValue>>) -> Self {
        let mut grid = Self::new();
        for (name, values) in map {
            grid.add(name, values.clone());
        }
        grid
    }

    pub fn dims(&self) -> &[(String, Vec<ParamValue>)] {
        &self.dims
    }

    /// Number of configurations. An empty grid has one (the base spec).
    pub fn len(&self) -> usize {
        self.dims.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every configuration, last dimension varying fastest.
    pub fn candidates(&self) -> Result<Vec<ParamSet>, TuneError> {
        if let Some((name, _)) = self.dims.iter().find(|(_, values)| values.is_empty()) {
            return Err(TuneError::InvalidGrid(format!(
                "dimension {name} has no values"
            )));
        }
        let total = self.len();
        let mut out = Vec::with_capacity(total);
        for flat in 0..total {
            let mut rest = flat;
            let mut picks = vec![0usize; self.dims.len()];
            for (slot, (_, values)) in picks.iter_mut().zip(&self.dims).rev() {
                *slot = rest % values.len();
                rest /= values.len();
            }
            let mut set = ParamSet::new();
            for ((name, values), &pick) in self.dims.iter().zip(&picks) {
                set.push(name, values[pick].clone());
            }
            out.push(set);
        }
        Ok(out)
    }
}
