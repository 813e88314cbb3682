//! Procedural meshes standing in for loaded models.

use kiln_engine::mesh::TexturedMesh;

/// Axis-aligned cube of edge `size` centered on the origin.
///
/// Each face has its own four vertices so normals stay flat and every face
/// maps the full unit UV square. Triangles wind counter-clockwise seen from
/// outside.
pub fn cube(size: f32, source_image: &str) -> TexturedMesh {
    let h = size * 0.5;

    // (normal, u axis, v axis); position = normal*h + (u*2-1)*h*u_axis + (1-v*2)*h*v_axis
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut mesh = TexturedMesh {
        source_image: source_image.to_string(),
        ..TexturedMesh::default()
    };

    for (normal, u_axis, v_axis) in faces {
        let base = mesh.positions.len() as u32;
        for [u, v] in corners {
            let su = (u * 2.0 - 1.0) * h;
            let sv = (1.0 - v * 2.0) * h;
            mesh.positions.push([
                normal[0] * h + u_axis[0] * su + v_axis[0] * sv,
                normal[1] * h + u_axis[1] * su + v_axis[1] * sv,
                normal[2] * h + u_axis[2] * su + v_axis[2] * sv,
            ]);
            mesh.normals.push(normal);
            mesh.uvs.push([u, v]);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    mesh
}

/// Horizontal square of edge `size` at height `y`, facing up.
pub fn floor(size: f32, y: f32, source_image: &str) -> TexturedMesh {
    let h = size * 0.5;
    TexturedMesh {
        indices: vec![0, 1, 2, 2, 3, 0],
        positions: vec![[-h, y, h], [h, y, h], [h, y, -h], [-h, y, -h]],
        normals: vec![[0.0, 1.0, 0.0]; 4],
        uvs: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        source_image: source_image.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// Every triangle's geometric normal agrees with its vertex normal.
    fn assert_outward_ccw(mesh: &TexturedMesh) {
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(mesh.positions[i as usize]));
            let face = (b - a).cross(c - a).normalize();
            let normal = Vec3::from(mesh.normals[tri[0] as usize]);
            assert!(face.dot(normal) > 0.99, "triangle {tri:?} winds the wrong way");
        }
    }

    #[test]
    fn cube_has_flat_faces() {
        let mesh = cube(2.0, "x");
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.uvs.len(), 24);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
        assert!(
            mesh.positions
                .iter()
                .all(|p| p.iter().all(|c| c.abs() == 1.0))
        );
        assert_outward_ccw(&mesh);
    }

    #[test]
    fn floor_faces_up() {
        let mesh = floor(10.0, -1.0, "x");
        assert!(mesh.positions.iter().all(|p| p[1] == -1.0));
        assert_outward_ccw(&mesh);
    }
}
