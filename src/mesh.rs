use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed loading OBJ {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed parsing OBJ: {0}")]
    Parse(#[from] tobj::LoadError),
    /// Some face vertices reference the attribute and some don't, so the
    /// attribute arrays couldn't line up with the positions.
    #[error("shape \"{shape}\" has {attribute} indices on {present} of its {expected} face vertices, but the attribute must be on all or none")]
    PartialAttribute {
        shape: String,
        attribute: &'static str,
        present: usize,
        expected: usize,
    },
    #[error("shape \"{shape}\" references {attribute} {index}, but there are only {count}")]
    IndexOutOfRange {
        shape: String,
        attribute: &'static str,
        index: usize,
        count: usize,
    },
}

/// De-indexed mesh attributes: every face vertex gets its own entry, so the
/// mesh can be drawn with a plain triangle list.
///
/// `normals` and `texcoords` are either empty or exactly as long as
/// `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
}

impl MeshData {
    /// Parses a Wavefront OBJ file. Polygons are triangulated, and all the
    /// shapes in the file are merged into one mesh. Material libraries are
    /// looked up next to the file.
    pub fn load(path: &Path) -> Result<MeshData, MeshError> {
        let obj = fs::read_to_string(path).map_err(|_| MeshError::Load {
            path: path.to_path_buf(),
            source: tobj::LoadError::OpenFileFailed,
        })?;
        let dir = path.parent().unwrap_or(Path::new(""));
        let (mesh, materials) =
            MeshData::parse(&obj, |mtl_path| tobj::load_mtl(dir.join(mtl_path)))?;
        if let Err(err) = materials {
            log::warn!("{}: material library not loaded: {err}", path.display());
        }
        log::info!(
            "loaded {}: {} vertices (normals: {}, texcoords: {})",
            path.display(),
            mesh.vertex_count(),
            mesh.has_normals(),
            mesh.has_texcoords(),
        );
        Ok(mesh)
    }

    /// Parses OBJ text from a reader. Material libraries aren't resolved.
    pub fn from_obj_reader<R: BufRead>(reader: &mut R) -> Result<MeshData, MeshError> {
        let mut obj = String::new();
        reader
            .read_to_string(&mut obj)
            .map_err(|_| tobj::LoadError::ReadError)?;
        let (mesh, _) = MeshData::parse(&obj, |_| Err(tobj::LoadError::OpenFileFailed))?;
        Ok(mesh)
    }

    fn parse<M>(obj: &str, load_mtl: M) -> Result<(MeshData, Materials), MeshError>
    where
        M: Fn(&Path) -> tobj::MTLLoadResult,
    {
        // tobj gives faces without normals or texcoords the first one of the
        // file, so presence has to be checked on the face records themselves.
        let shapes = scan_faces(obj);
        check_uniform(&shapes, "normal", |shape| shape.normals)?;
        check_uniform(&shapes, "texcoord", |shape| shape.texcoords)?;

        let mut bytes = obj.as_bytes();
        let (models, materials) = tobj::load_obj_buf(&mut bytes, &load_options(), load_mtl)?;
        let mut mesh = MeshData::default();
        for model in &models {
            mesh.append(model)?;
        }
        Ok((mesh, materials))
    }

    fn append(&mut self, model: &tobj::Model) -> Result<(), MeshError> {
        let source = &model.mesh;
        for &index in &source.indices {
            let position = lookup(model, "position", &source.positions, index, 3)?;
            self.positions
                .push(Vec3::new(position[0], position[1], position[2]));
        }
        for &index in &source.normal_indices {
            let normal = lookup(model, "normal", &source.normals, index, 3)?;
            self.normals.push(Vec3::new(normal[0], normal[1], normal[2]));
        }
        for &index in &source.texcoord_indices {
            let texcoord = lookup(model, "texcoord", &source.texcoords, index, 2)?;
            self.texcoords.push(Vec2::new(texcoord[0], texcoord[1]));
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_texcoords(&self) -> bool {
        !self.texcoords.is_empty()
    }
}

type Materials = Result<Vec<tobj::Material>, tobj::LoadError>;

/// The loader settings of the original OBJ pipeline: polygons are
/// triangulated, and each attribute keeps its own index stream.
fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Face vertex counts of one `o`/`g` group.
#[derive(Debug, Default, PartialEq)]
struct FaceAttributes {
    shape: String,
    vertices: usize,
    normals: usize,
    texcoords: usize,
}

/// Counts, per group, the face vertices that reference a normal or texcoord
/// (`v/vt`, `v//vn`, `v/vt/vn`).
fn scan_faces(obj: &str) -> Vec<FaceAttributes> {
    let mut shapes = vec![FaceAttributes {
        shape: "unnamed_object".to_string(),
        ..Default::default()
    }];
    for line in obj.lines() {
        let line = line.split('#').next().unwrap_or("");
        let mut words = line.split_whitespace();
        match words.next() {
            Some("o" | "g") => {
                let name = words.collect::<Vec<_>>().join(" ");
                shapes.push(FaceAttributes {
                    shape: name,
                    ..Default::default()
                });
            }
            Some("f") => {
                let Some(shape) = shapes.last_mut() else {
                    continue;
                };
                for vertex in words {
                    let mut fields = vertex.split('/').skip(1);
                    shape.vertices += 1;
                    if fields.next().is_some_and(|vt| !vt.is_empty()) {
                        shape.texcoords += 1;
                    }
                    if fields.next().is_some_and(|vn| !vn.is_empty()) {
                        shape.normals += 1;
                    }
                }
            }
            _ => {}
        }
    }
    shapes.retain(|shape| shape.vertices > 0);
    shapes
}

/// An attribute must be on every face vertex of the file, or on none.
fn check_uniform(
    shapes: &[FaceAttributes],
    attribute: &'static str,
    count: fn(&FaceAttributes) -> usize,
) -> Result<(), MeshError> {
    let mut first_has: Option<bool> = None;
    for shape in shapes {
        let present = count(shape);
        let has = present == shape.vertices;
        if (present != 0 && !has) || first_has.is_some_and(|first| first != has) {
            return Err(MeshError::PartialAttribute {
                shape: shape.shape.clone(),
                attribute,
                present,
                expected: shape.vertices,
            });
        }
        first_has.get_or_insert(has);
    }
    Ok(())
}

fn lookup<'a>(
    model: &tobj::Model,
    attribute: &'static str,
    values: &'a [f32],
    index: u32,
    components: usize,
) -> Result<&'a [f32], MeshError> {
    let index = index as usize;
    let start = index * components;
    values
        .get(start..start + components)
        .ok_or_else(|| MeshError::IndexOutOfRange {
            shape: model.name.clone(),
            attribute,
            index,
            count: values.len() / components,
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parse(obj: &str) -> Result<MeshData, MeshError> {
        MeshData::from_obj_reader(&mut Cursor::new(obj))
    }

    #[test]
    fn triangles_without_attributes() {
        let mesh = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             v 1 1 0\n\
             f 1 2 3\n\
             f 2 4 3\n",
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 3 * 2);
        assert!(!mesh.has_normals());
        assert!(!mesh.has_texcoords());
        assert_eq!(mesh.positions[4], Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn normals_line_up_with_positions() {
        let mesh = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             vn 0 0 -1\n\
             f 1//1 2//1 3//1\n\
             f 3//2 2//2 1//2\n",
        )
        .unwrap();
        assert!(mesh.has_normals());
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        assert_eq!(mesh.normals[0], Vec3::Z);
        assert_eq!(mesh.normals[5], -Vec3::Z);
        assert!(!mesh.has_texcoords());
    }

    #[test]
    fn texcoords_are_read_from_their_own_array() {
        let mesh = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vt 0.25 0.75\n\
             f 1/1 2/1 3/1\n",
        )
        .unwrap();
        assert_eq!(mesh.texcoords, vec![Vec2::new(0.25, 0.75); 3]);
    }

    #[test]
    fn quads_are_triangulated() {
        let mesh = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 1 1 0\n\
             v 0 1 0\n\
             f 1 2 3 4\n",
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn partial_normals_are_rejected() {
        let err = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             f 1//1 2//1 3//1\n\
             f 1 2 3\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, MeshError::PartialAttribute { attribute: "normal", .. }),
            "{err}"
        );
    }

    #[test]
    fn partial_texcoords_are_rejected() {
        let err = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vt 0 0\n\
             f 1/1 2/1 3/1\n\
             f 1 2 3\n",
        )
        .unwrap_err();
        assert!(
            matches!(
                err,
                MeshError::PartialAttribute {
                    attribute: "texcoord",
                    ..
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn plain_face_before_normal_face_is_rejected() {
        let err = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             f 1 2 3\n\
             f 1//1 2//1 3//1\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, MeshError::PartialAttribute { attribute: "normal", present: 3, expected: 6, .. }),
            "{err}"
        );
    }

    #[test]
    fn normals_within_one_face_must_be_complete() {
        let err = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             f 1//1 2 3\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, MeshError::PartialAttribute { present: 1, expected: 3, .. }),
            "{err}"
        );
    }

    #[test]
    fn shapes_must_agree_on_normals() {
        let err = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             o lit\n\
             f 1//1 2//1 3//1\n\
             o unlit\n\
             f 1 2 3\n",
        )
        .unwrap_err();
        match err {
            MeshError::PartialAttribute {
                shape,
                attribute,
                present,
                expected,
            } => {
                assert_eq!(shape, "unlit");
                assert_eq!(attribute, "normal");
                assert_eq!((present, expected), (0, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shapes_with_normals_everywhere_merge() {
        let mesh = parse(
            "v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             o first\n\
             f 1//1 2//1 3//1\n\
             o second # comment\n\
             f 3//1 2//1 1//1\n",
        )
        .unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.normals, vec![Vec3::Z; 6]);
    }

    #[test]
    fn face_scan_counts_per_group() {
        let shapes = scan_faces(
            "f 1/1/1 2/2/2 3/3/3\n\
             g side\n\
             f 1//1 2//1 3//1 4//1\n\
             g empty\n",
        );
        assert_eq!(
            shapes,
            vec![
                FaceAttributes {
                    shape: "unnamed_object".to_string(),
                    vertices: 3,
                    normals: 3,
                    texcoords: 3,
                },
                FaceAttributes {
                    shape: "side".to_string(),
                    vertices: 4,
                    normals: 4,
                    texcoords: 0,
                },
            ]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = MeshData::load(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(err, MeshError::Load { .. }));
    }

    #[test]
    fn bundled_cube_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/cube.obj");
        let mesh = MeshData::load(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 12 * 3);
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
    }
}
