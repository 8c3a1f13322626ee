//! Primitive brushes and profiles

use crate::float_types::{Real, TAU};
use crate::model::Model;
use crate::plane::Plane;
use crate::polygon::Polygon;
use nalgebra::{Point3, Vector3};

impl Model {
    /// Axis-aligned box with one corner at the origin, one quad per side,
    /// wound counter-clockwise seen from outside.
    ///
    /// ```text
    ///     7-------6
    ///    /|      /|
    ///   4-------5 |
    ///   | |     | |
    ///   | 3-----|-2
    ///   |/      |/
    ///   0-------1
    /// ```
    pub fn cuboid(width: Real, length: Real, height: Real) -> Model {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(width, 0.0, 0.0),
            Point3::new(width, length, 0.0),
            Point3::new(0.0, length, 0.0),
            Point3::new(0.0, 0.0, height),
            Point3::new(width, 0.0, height),
            Point3::new(width, length, height),
            Point3::new(0.0, length, height),
        ];
        let faces = [
            ([0, 3, 2, 1], -Vector3::z()),
            ([4, 5, 6, 7], Vector3::z()),
            ([0, 1, 5, 4], -Vector3::y()),
            ([3, 7, 6, 2], Vector3::y()),
            ([0, 4, 7, 3], -Vector3::x()),
            ([1, 2, 6, 5], Vector3::x()),
        ];
        Model::from_polygons(faces.into_iter().map(|(indices, normal)| {
            let plane = Plane::from_point_normal(&corners[indices[0]], &normal);
            Polygon::with_plane(indices.iter().map(|i| corners[*i]).collect(), plane)
        }))
    }

    pub fn cube(size: Real) -> Model {
        Self::cuboid(size, size, size)
    }
}

impl Polygon {
    /// Axis-aligned rectangle in the XY plane at `z`, centred on the Z axis,
    /// facing +Z.
    pub fn rectangle(width: Real, height: Real, z: Real) -> Polygon {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Polygon::with_plane(
            vec![
                Point3::new(-hw, -hh, z),
                Point3::new(hw, -hh, z),
                Point3::new(hw, hh, z),
                Point3::new(-hw, hh, z),
            ],
            Plane::from_normal(Vector3::z(), z),
        )
    }

    /// Regular polygon in the XY plane at `z` around the Z axis, facing +Z.
    /// `None` for fewer than three sides.
    pub fn regular_ngon(sides: usize, radius: Real, z: Real) -> Option<Polygon> {
        if sides < 3 {
            return None;
        }
        let vertices = (0..sides)
            .map(|i| {
                let theta = TAU * i as Real / sides as Real;
                Point3::new(radius * theta.cos(), radius * theta.sin(), z)
            })
            .collect();
        Some(Polygon::with_plane(vertices, Plane::from_normal(Vector3::z(), z)))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Model, ShelfId};

    #[test]
    fn cube_faces_are_valid_and_closed() {
        let cube = Model::cube(2.0);
        assert_eq!(cube.polygon_count(ShelfId::Committed), 6);
        for (_, p) in cube.polygons(ShelfId::Committed) {
            assert!(p.validate().is_ok());
            assert!((p.area() - 4.0).abs() < 1e-9);
        }
        assert!(cube.is_watertight(ShelfId::Committed));
        assert_eq!(cube.distinct_vertex_count(ShelfId::Committed), 8);
    }
}
