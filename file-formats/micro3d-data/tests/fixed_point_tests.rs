//! Fixed-point transforms and bit streams used together

use glam::Vec3;
use micro3d_data::fixed::{self, ONE};
use micro3d_data::{AffineTrans, BitReader, BitWriter, ByteReader, DataError, Vec3i};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn rotated(axis: char, angle: i32, t: Vec3i) -> AffineTrans {
    let mut a = AffineTrans::IDENTITY;
    match axis {
        'x' => a.set_rotation_x(angle),
        'y' => a.set_rotation_y(angle),
        _ => a.set_rotation_z(angle),
    }
    a.set_translation(t);
    a
}

#[rstest]
#[case('x', 0)]
#[case('x', 333)]
#[case('y', 1024)]
#[case('y', -2900)]
#[case('z', 2048)]
#[case('z', 4095)]
fn test_identity_is_neutral_for_rotations(#[case] axis: char, #[case] angle: i32) {
    let a = rotated(axis, angle, Vec3i::new(-70, 12, 9000));
    assert_eq!(AffineTrans::IDENTITY.mul(&a), a);
    assert_eq!(a.mul(&AffineTrans::IDENTITY), a);
    assert_eq!(a.transform(Vec3i::ZERO), a.translation());
}

#[test]
fn test_quarter_turn_matches_float_matrix() {
    let a = rotated('z', 1024, Vec3i::new(10, 20, 30));
    assert_eq!(
        a.to_array(),
        [0, -ONE, 0, 10, ONE, 0, 0, 20, 0, 0, ONE, 30]
    );

    let p = Vec3i::new(5, -3, 2);
    assert_eq!(a.transform(p), Vec3i::new(13, 25, 32));
    let m = a.to_mat4();
    assert_eq!(m.transform_point3(Vec3::new(5.0, -3.0, 2.0)), Vec3::new(13.0, 25.0, 32.0));
    assert_eq!(a.to_matrix34().transform_point(Vec3::new(5.0, -3.0, 2.0)), Vec3::new(13.0, 25.0, 32.0));
}

#[test]
fn test_axis_rotation_agrees_with_z_rotation() {
    let mut about_axis = AffineTrans::IDENTITY;
    about_axis.set_rotation_axis(Vec3i::new(0, 0, ONE), 512);
    let about_z = rotated('z', 512, Vec3i::ZERO);
    assert_eq!(about_axis, about_z);
}

#[rstest]
#[case(Vec3i::new(3, 4, 0))]
#[case(Vec3i::new(-100_000, 20, 7))]
#[case(Vec3i::new(1, 1, 1))]
fn test_unit_vectors_have_fixed_length(#[case] v: Vec3i) {
    let u = v.unit();
    let length = fixed::usqrt(u.dot(u));
    assert!((length - ONE).abs() <= 2, "length {length} for {u:?}");
}

#[test]
fn test_look_at_down_negative_z() {
    let view = AffineTrans::look_at(
        Vec3i::new(0, 0, 100),
        Vec3i::new(0, 0, -ONE),
        Vec3i::new(0, ONE, 0),
    );
    // the eye lands at the origin of view space
    assert_eq!(view.transform(Vec3i::new(0, 0, 100)), Vec3i::ZERO);
    assert_eq!(view.m[2][..3], [0, 0, -ONE]);
}

/// A run-length block the way packed vertex data is laid out: a control
/// byte with the run length and a width selector, then signed fields
#[rstest]
#[case(0, 8, -128)]
#[case(1, 10, 511)]
#[case(2, 13, -4096)]
#[case(3, 16, 32767)]
fn test_packed_runs_decode(#[case] selector: u32, #[case] width: u32, #[case] value: i32) {
    let mut w = BitWriter::new();
    w.write_bits(1 | selector << 6, 8);
    for component in [value, -1, 0, 1, value, 2] {
        w.write_bits(component as u32, width);
    }
    w.flush_bits();
    w.write_u16_le(0xBEEF);
    let data = w.into_inner();

    let mut r = BitReader::new(&data);
    let control = r.read_ubits(8).unwrap();
    assert_eq!(control & 0x3F, 1);
    assert_eq!(control >> 6, selector);
    let mut decoded = Vec::new();
    for _ in 0..6 {
        decoded.push(r.read_bits(width).unwrap());
    }
    assert_eq!(decoded, vec![value, -1, 0, 1, value, 2]);
    r.clear_bit_cache();
    assert_eq!(r.read_u16_le().unwrap(), 0xBEEF);
    assert_eq!(r.remaining(), 0);
}

#[test]
fn test_reading_past_the_end() {
    let mut r = BitReader::new(&[1, 2, 3]);
    r.skip(2).unwrap();
    assert_eq!(
        r.read_u16_le().unwrap_err(),
        DataError::UnexpectedEof {
            offset: 2,
            needed: 1
        }
    );
    assert_eq!(r.read_ubits(26).unwrap_err(), DataError::InvalidBitWidth(26));
}
