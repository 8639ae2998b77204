use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array, ArrayD, ArrayViewD, Dimension};

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a value in the computation graph; gradient hooks are keyed by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(u64);

impl VariableId {
    fn next() -> Self {
        Self(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An activation or parameter that may take part in a backward pass
#[derive(Debug)]
pub struct Variable {
    id: VariableId,
    value: ArrayD<f32>,
    requires_grad: bool,
}

impl Variable {
    /// A constant: never receives a gradient
    pub fn new<D: Dimension>(value: Array<f32, D>) -> Self {
        Self {
            id: VariableId::next(),
            value: value.into_dyn(),
            requires_grad: false,
        }
    }

    /// A value whose gradient the backward pass will deliver
    pub fn with_grad<D: Dimension>(value: Array<f32, D>) -> Self {
        Self {
            requires_grad: true,
            ..Self::new(value)
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn value(&self) -> ArrayViewD<'_, f32> {
        self.value.view()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Copy of the value cut off from gradient tracking, with a fresh identity
    pub fn detach(&self) -> Self {
        Self::new(self.value.clone())
    }
}
