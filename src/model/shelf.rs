//! Scoped selection of the shelf that receives new polygons

use super::Model;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShelfId {
    /// Committed geometry
    #[default]
    Committed,
    /// Disposable preview geometry of the running tool
    Scratch,
}

impl ShelfId {
    pub const fn index(self) -> usize {
        match self {
            ShelfId::Committed => 0,
            ShelfId::Scratch => 1,
        }
    }
}

/// Makes a shelf active for as long as it lives and restores the previous
/// one when dropped, including on early return and unwinding.
///
/// ```
/// use brushedit::model::{AddOp, Model, ShelfId};
/// use brushedit::polygon::Polygon;
/// use nalgebra::Point3;
///
/// let mut model = Model::new();
/// {
///     let mut scratch = model.use_shelf(ShelfId::Scratch);
///     scratch.add_polygon(
///         Polygon::new(vec![
///             Point3::new(0.0, 0.0, 0.0),
///             Point3::new(1.0, 0.0, 0.0),
///             Point3::new(0.0, 1.0, 0.0),
///         ]),
///         AddOp::Add,
///     )
///     .unwrap();
/// }
/// assert_eq!(model.active_shelf(), ShelfId::Committed);
/// assert_eq!(model.polygon_count(ShelfId::Scratch), 1);
/// ```
pub struct ShelfGuard<'a> {
    model: &'a mut Model,
    previous: ShelfId,
}

impl Model {
    pub fn use_shelf(&mut self, shelf: ShelfId) -> ShelfGuard<'_> {
        let previous = self.active;
        self.active = shelf;
        ShelfGuard {
            model: self,
            previous,
        }
    }
}

impl Deref for ShelfGuard<'_> {
    type Target = Model;

    fn deref(&self) -> &Model {
        self.model
    }
}

impl DerefMut for ShelfGuard<'_> {
    fn deref_mut(&mut self) -> &mut Model {
        self.model
    }
}

impl Drop for ShelfGuard<'_> {
    fn drop(&mut self) {
        self.model.active = self.previous;
    }
}
