//! Scalar and array variable storage, with auto-dimensioning (spec §3).

use std::collections::HashMap;

use crate::constants::AUTO_DIM_BOUND;
use crate::error::ErrorKind;
use crate::value::{Name, Value};

/// Flat scalar store: `Name -> Value`.
///
/// Reading an unset name yields the type's zero value (`0` or `""`)
/// rather than an error; only a type mismatch on write is an error.
#[derive(Default)]
pub struct ScalarStore {
    values: HashMap<Name, Value>,
}

impl ScalarStore {
    pub fn new() -> Self {
        ScalarStore::default()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, name: &Name) -> Value {
        match self.values.get(name) {
            Some(v) => v.clone(),
            None if name.is_string() => Value::string(Vec::new()),
            None => Value::number(0.0),
        }
    }

    /// Assigns `value` to `name`, failing with [`ErrorKind::TypeMismatch`]
    /// if the value's type disagrees with the name's `$`-suffix type.
    pub fn set(&mut self, name: Name, value: Value) -> Result<(), ErrorKind> {
        if name.is_string() != value.is_string() {
            return Err(ErrorKind::TypeMismatch);
        }
        self.values.insert(name, value);
        Ok(())
    }
}

/// An n-dimensional (1 or 2 axis) dense rectangular array of `Value`.
pub struct Array {
    dims: Vec<usize>,
    data: Vec<Value>,
    is_string: bool,
}

impl Array {
    fn new(dims: Vec<usize>, is_string: bool) -> Self {
        let len = dims.iter().product();
        let fill = if is_string {
            Value::string(Vec::new())
        } else {
            Value::number(0.0)
        };
        Array {
            dims,
            data: vec![fill; len],
            is_string,
        }
    }

    fn index(&self, subs: &[usize]) -> Result<usize, ErrorKind> {
        if subs.len() != self.dims.len() {
            return Err(ErrorKind::BadSubscript);
        }
        let mut idx = 0usize;
        for (axis, &sub) in subs.iter().enumerate() {
            if sub >= self.dims[axis] {
                return Err(ErrorKind::BadSubscript);
            }
            idx = idx * self.dims[axis] + sub;
        }
        Ok(idx)
    }

    pub fn get(&self, subs: &[usize]) -> Result<Value, ErrorKind> {
        let idx = self.index(subs)?;
        Ok(self.data[idx].clone())
    }

    pub fn set(&mut self, subs: &[usize], value: Value) -> Result<(), ErrorKind> {
        if value.is_string() != self.is_string {
            return Err(ErrorKind::TypeMismatch);
        }
        let idx = self.index(subs)?;
        self.data[idx] = value;
        Ok(())
    }
}

/// `Name -> Array` store with auto-dimensioning on first reference
/// (spec §3: an undeclared array gets bound 10 on every axis the first
/// time it is subscripted, by `DIM` or otherwise).
#[derive(Default)]
pub struct ArrayStore {
    arrays: HashMap<Name, Array>,
}

impl ArrayStore {
    pub fn new() -> Self {
        ArrayStore::default()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    /// Explicitly `DIM`s an array with the given per-axis upper bounds
    /// (each axis has `bound + 1` elements). Fails if the array already
    /// exists (spec §3: *Redimensioned Array*).
    pub fn dim(&mut self, name: Name, bounds: &[u16]) -> Result<(), ErrorKind> {
        if self.arrays.contains_key(&name) {
            return Err(ErrorKind::RedimensionedArray);
        }
        let is_string = name.is_string();
        let dims = bounds.iter().map(|&b| b as usize + 1).collect();
        self.arrays.insert(name, Array::new(dims, is_string));
        Ok(())
    }

    /// Returns the array for `name`, auto-dimensioning it with bound 10
    /// on every axis in `subs` if it does not already exist.
    fn ensure(&mut self, name: &Name, axis_count: usize) -> &mut Array {
        if !self.arrays.contains_key(name) {
            let dims = vec![AUTO_DIM_BOUND as usize + 1; axis_count];
            self.arrays
                .insert(name.clone(), Array::new(dims, name.is_string()));
        }
        self.arrays.get_mut(name).expect("just inserted")
    }

    pub fn get(&mut self, name: &Name, subs: &[usize]) -> Result<Value, ErrorKind> {
        self.ensure(name, subs.len()).get(subs)
    }

    pub fn set(&mut self, name: &Name, subs: &[usize], value: Value) -> Result<(), ErrorKind> {
        self.ensure(name, subs.len()).set(subs, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_scalar_defaults() {
        let store = ScalarStore::new();
        assert_eq!(store.get(&Name::new("X")), Value::number(0.0));
        assert_eq!(store.get(&Name::new("X$")), Value::string(Vec::new()));
    }

    #[test]
    fn scalar_type_mismatch_on_set() {
        let mut store = ScalarStore::new();
        let err = store.set(Name::new("X"), Value::string("hi")).unwrap_err();
        assert_eq!(err, ErrorKind::TypeMismatch);
    }

    #[test]
    fn array_auto_dims_to_bound_ten() {
        let mut arrays = ArrayStore::new();
        let name = Name::new("A");
        arrays.set(&name, &[3], Value::number(7.0)).unwrap();
        assert_eq!(arrays.get(&name, &[3]).unwrap(), Value::number(7.0));
        assert_eq!(arrays.get(&name, &[10]).unwrap(), Value::number(0.0));
        assert_eq!(
            arrays.get(&name, &[11]).unwrap_err(),
            ErrorKind::BadSubscript
        );
    }

    #[test]
    fn redim_of_existing_array_is_an_error() {
        let mut arrays = ArrayStore::new();
        let name = Name::new("A");
        arrays.dim(name.clone(), &[5]).unwrap();
        assert_eq!(
            arrays.dim(name, &[5]).unwrap_err(),
            ErrorKind::RedimensionedArray
        );
    }
}
