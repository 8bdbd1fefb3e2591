//! Dense N-dimensional storage for mapped results.

use serde::{Deserialize, Serialize};

/// N-dimensional grid with a flat backing vector.
///
/// Row-major: the last dimension varies fastest. Mapped measurements are
/// stored with the declared axes reversed, so the first declared axis is the
/// innermost dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T: Clone> SweepGrid<T> {
    /// Grid of `shape` with every point set to `fill`
    pub fn new(shape: Vec<usize>, fill: T) -> Self {
        let len = shape.iter().product();
        let strides = compute_strides(&shape);
        Self {
            data: vec![fill; len],
            shape,
            strides,
        }
    }
}

impl<T> SweepGrid<T> {
    /// Wrap row-major data. `None` if the length does not match the shape.
    pub fn from_data(shape: Vec<usize>, data: Vec<T>) -> Option<Self> {
        if data.len() != shape.iter().product::<usize>() {
            return None;
        }
        let strides = compute_strides(&shape);
        Some(Self {
            data,
            shape,
            strides,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat position of a multi-index, `None` when out of bounds
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.shape)
            .zip(&self.strides)
            .try_fold(0, |flat, ((&idx, &size), &stride)| {
                (idx < size).then_some(flat + idx * stride)
            })
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut T> {
        self.flat_index(indices).map(|i| &mut self.data[i])
    }

    /// Store `value` at `indices`; false when out of bounds
    pub fn set(&mut self, indices: &[usize], value: T) -> bool {
        match self.get_mut(indices) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// All multi-indices in storage order
    pub fn indices(&self) -> GridIndices {
        GridIndices {
            shape: self.shape.clone(),
            current: vec![0; self.shape.len()],
            done: self.data.is_empty(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, &T)> {
        self.indices().zip(self.data.iter())
    }

    /// Apply `f` to every point, keeping the shape
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> SweepGrid<U> {
        SweepGrid {
            data: self.data.iter().map(f).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Split into runs along the last dimension.
    ///
    /// For a 2-D grid these are its rows.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        let width = self.shape.last().copied().unwrap_or(0).max(1);
        self.data.chunks(width)
    }
}

fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Iterator over every multi-index of a grid, last dimension fastest
pub struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.current.clone();

        self.done = true;
        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                self.done = false;
                break;
            }
            self.current[i] = 0;
        }

        Some(result)
    }
}
