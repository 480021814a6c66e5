//! Integration tests for MBAC decoding against hand-built buffers

use glam::Vec3;
use micro3d_data::BitWriter;
use micro3d_mbac::{BlendMode, MbacError, Model, pattern_mask};
use pretty_assertions::assert_eq;
use rstest::rstest;

/// Route decoder warnings to the test output
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const VERTICES: [[i32; 3]; 6] = [
    [0, 0, 0],
    [100, 0, 0],
    [0, 100, 0],
    [-100, -100, 10],
    [200, 0, -5],
    [0, -200, 511],
];

/// Options for the version 5 fixture
#[derive(Clone, Copy)]
struct Fixture {
    colored_material: u32,
    bone1_vertices: u16,
    trailer: usize,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            colored_material: 0,
            bone1_vertices: 3,
            trailer: 20,
        }
    }
}

fn write_identity_bone(w: &mut BitWriter, vertices: u16, parent: i16, t: [i16; 3]) {
    w.write_u16_le(vertices).write_i16_le(parent);
    for row in 0..3 {
        for col in 0..3 {
            w.write_i16_le(if row == col { 4096 } else { 0 });
        }
        w.write_i16_le(t[row]);
    }
}

/// Version 5, packed vertices, plain normals, polygon format 3 with one
/// colored triangle, two textured triangles and a textured quad over two
/// textures and two patterns
fn v5_model(f: Fixture) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bytes(b"MB").write_u8(5).write_u8(0);
    w.write_bytes(&[2, 1, 3, 1]);
    // vertices, t3, t4, bones
    w.write_u16_le(6).write_u16_le(2).write_u16_le(1).write_u16_le(2);
    // c3, c4, textures, patterns, colors
    w.write_u16_le(1).write_u16_le(0).write_u16_le(2).write_u16_le(2).write_u16_le(1);

    // pattern 0: colored (1,0), texture 0 (1,0), texture 1 (0,1)
    for v in [1u16, 0, 1, 0, 0, 1] {
        w.write_u16_le(v);
    }
    // pattern 1: texture 1 gets the second triangle
    for v in [0u16, 0, 0, 0, 1, 0] {
        w.write_u16_le(v);
    }

    // one run of six vertices at 10 bits
    w.write_bits(5 | 1 << 6, 8);
    for v in VERTICES.iter().flatten() {
        w.write_bits(*v as u32, 10);
    }
    w.flush_bits();

    for _ in 0..6 {
        w.write_i16_le(0).write_i16_le(0).write_i16_le(4096);
    }

    // colored: material bits, index bits, color bits, color id bits, unknown
    w.write_bytes(&[6, 3, 8, 1, 0]);
    for c in [255, 128, 0] {
        w.write_bits(c, 8);
    }
    w.write_bits(f.colored_material, 6);
    w.write_bits(3, 3).write_bits(4, 3).write_bits(5, 3);
    w.write_bits(0, 1);

    // textured v3 header continues the bit stream
    for v in [7, 3, 7, 0] {
        w.write_bits(v, 8);
    }
    let textured = |w: &mut BitWriter, material: u32, corners: &[u32]| {
        w.write_bits(material, 7);
        for &c in corners {
            w.write_bits(c, 3);
        }
        for uv in 0..corners.len() as u32 * 2 {
            w.write_bits(uv, 7);
        }
    };
    textured(&mut w, 2, &[0, 1, 2]);
    textured(&mut w, 0, &[3, 4, 5]);
    textured(&mut w, 16, &[0, 1, 2, 3]);
    w.flush_bits();

    write_identity_bone(&mut w, 3, -1, [0, 0, 0]);
    write_identity_bone(&mut w, f.bone1_vertices, 0, [0, 0, 50]);
    w.write_bytes(&vec![0; f.trailer]);
    w.into_inner()
}

#[test]
fn test_header_counts() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let header = model.header();
    assert_eq!(header.version, 5);
    assert_eq!(model.vertex_count(), 6);
    assert_eq!(model.num_patterns(), 2);
    assert_eq!(model.num_textures(), 2);
    assert_eq!(model.bones().len(), 2);
    assert_eq!(model.rest_normals().map(<[Vec3]>::len), Some(6));
}

#[test]
fn test_packed_vertices() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let expected: Vec<Vec3> = VERTICES
        .iter()
        .map(|v| Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32))
        .collect();
    assert_eq!(model.rest_positions(), expected.as_slice());
}

#[test]
fn test_bucket_order_and_tables() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    assert_eq!(
        model.indices(),
        &[3, 4, 5, 0, 1, 2, 2, 1, 3, 0, 1, 2, 3, 4, 5]
    );
    let textured = model.sub_meshes_textured();
    assert_eq!(textured[0], vec![[0, 0], [3, 6]]);
    assert_eq!(textured[1], vec![[3, 0], [0, 0]]);
    assert_eq!(model.sub_meshes_colored()[0], [3, 0]);
    assert_eq!(model.textured_index_count(), 12);

    assert_eq!(
        model.textured_ranges(BlendMode::Normal, 1),
        vec![(0, 3, false), (3, 6, true)]
    );
    assert_eq!(model.textured_ranges(BlendMode::Half, 0), vec![(9, 3, false)]);
    assert_eq!(model.colored_ranges(BlendMode::Normal), vec![(12, 3, false)]);
    model.validate().unwrap();
}

#[test]
fn test_bucket_sums_match_index_counts() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let textured: usize = model.sub_meshes_textured().iter().flatten().flatten().sum();
    let colored: usize = model.sub_meshes_colored().iter().flatten().sum();
    assert_eq!(textured, model.textured_index_count());
    assert_eq!(textured + colored, model.indices().len());
    let bone_vertices: usize = model.bones().iter().map(|b| b.vertex_count).sum();
    assert_eq!(bone_vertices, model.vertex_count());
}

#[test]
fn test_colored_vertex_data() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let colored = &model.texcoords()[12 * 5..];
    assert_eq!(&colored[..5], &[255, 128, 0, 0, 0]);
}

#[test]
fn test_pattern_masks_hide_polygons() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let sentinel = model.sentinel_index();
    assert_eq!(sentinel, 6);

    let base = model.pattern_indices(0);
    assert_eq!(&base[..3], &[sentinel; 3]);
    assert_eq!(&base[3..], &model.indices()[3..]);

    assert_eq!(model.pattern_indices(pattern_mask(1)), model.indices());
}

#[test]
fn test_decoding_is_deterministic() {
    let data = v5_model(Fixture::default());
    assert_eq!(Model::parse(&data).unwrap(), Model::parse(&data).unwrap());
}

#[test]
fn test_rest_pose_applies_bone_translation() {
    let model = Model::parse(&v5_model(Fixture::default())).unwrap();
    let mesh = model.rest_pose();
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.positions[0], Vec3::ZERO);
    assert_eq!(mesh.positions[3], Vec3::new(-100.0, -100.0, 60.0));
    assert!(mesh.positions[6].z.is_infinite());
    let normals = mesh.normals.unwrap();
    assert_eq!(normals[4], Vec3::new(0.0, 0.0, 4096.0));
}

#[test]
fn test_missing_trailer_is_accepted() {
    init_logging();
    let model = Model::parse(&v5_model(Fixture {
        trailer: 0,
        ..Fixture::default()
    }));
    assert!(model.is_ok());
}

#[rstest]
#[case::reserved_material(Fixture { colored_material: 0b100, ..Fixture::default() })]
#[case::bone_vertex_sum(Fixture { bone1_vertices: 2, ..Fixture::default() })]
fn test_malformed_models_are_rejected(#[case] fixture: Fixture) {
    let err = Model::parse(&v5_model(fixture)).unwrap_err();
    match err.root() {
        MbacError::ReservedMaterialBits { material, mask } => {
            assert_eq!(*material, 0b1000);
            assert_eq!(*mask, 0xFC09);
        }
        MbacError::BoneVertexMismatch { bones, vertices } => {
            assert_eq!((*bones, *vertices), (5, 6));
        }
        other => panic!("unexpected error: {other}"),
    }
}
