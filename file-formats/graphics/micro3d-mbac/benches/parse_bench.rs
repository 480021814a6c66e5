use criterion::{Criterion, criterion_group, criterion_main};
use micro3d_data::BitWriter;
use micro3d_mbac::Model;

/// Version 4 model with packed vertices, compressed normals and a grid of
/// bit-packed textured quads
fn create_test_model(side: u16) -> Vec<u8> {
    let vertices = side * side;
    let quads = (side - 1) * (side - 1);
    let mut w = BitWriter::new();
    w.write_bytes(b"MB").write_u8(4).write_u8(0);
    w.write_bytes(&[2, 2, 2, 1]);
    w.write_u16_le(vertices).write_u16_le(0).write_u16_le(quads).write_u16_le(1);

    let mut left = vertices;
    let mut i = 0u16;
    while left > 0 {
        let run = left.min(64);
        w.write_bits(u32::from(run - 1) | 0b11 << 6, 8);
        for _ in 0..run {
            let (x, y) = (i % side, i / side);
            w.write_bits(u32::from(x) * 16, 16)
                .write_bits(u32::from(y) * 16, 16)
                .write_bits(0, 16);
            i += 1;
        }
        left -= run;
    }
    w.flush_bits();

    for _ in 0..vertices {
        // pooled +Z normal
        w.write_bits(64, 7).write_bits(2, 3);
    }
    w.flush_bits();

    w.write_u8(7).write_u8(16);
    for q in 0..quads {
        let (x, y) = (q % (side - 1), q / (side - 1));
        let a = u32::from(y * side + x);
        w.write_bits(0, 7);
        for index in [a, a + 1, a + u32::from(side), a + u32::from(side) + 1] {
            w.write_bits(index, 16);
        }
        for uv in 0..8 {
            w.write_bits(uv * 8, 7);
        }
    }
    w.flush_bits();

    w.write_u16_le(vertices).write_i16_le(-1);
    for v in [4096i16, 0, 0, 0, 0, 4096, 0, 0, 0, 0, 4096, 0] {
        w.write_i16_le(v);
    }
    w.write_bytes(&[0; 20]);
    w.into_inner()
}

fn bench_model_parse(c: &mut Criterion) {
    let data = create_test_model(64);

    c.bench_function("parse_model", |b| {
        b.iter(|| {
            let _model = Model::parse(&data).unwrap();
        })
    });
}

fn bench_rest_pose(c: &mut Criterion) {
    let model = Model::parse(&create_test_model(64)).unwrap();

    c.bench_function("rest_pose", |b| {
        b.iter(|| {
            let _mesh = model.rest_pose();
        })
    });
}

criterion_group!(benches, bench_model_parse, bench_rest_pose);
criterion_main!(benches);
