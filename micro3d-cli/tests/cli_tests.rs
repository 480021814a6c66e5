//! End-to-end runs of the micro3d binary against hand-built assets

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use micro3d_data::BitWriter;
use micro3d_render::command::{END, PARALLEL_SCALE, PDATA_COLOR_PER_COMMAND, PRIMITIVE_TRIANGLES, VERSION_1_0};
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn micro3d() -> Command {
    let mut cmd = Command::cargo_bin("micro3d").unwrap();
    cmd.env_remove("MICRO3D_VIEWPORT")
        .env_remove("MICRO3D_TEXTURE_FILTER")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn write_bone(w: &mut BitWriter, vertices: u16, parent: i16) {
    w.write_u16_le(vertices).write_i16_le(parent);
    for row in 0..3 {
        for col in 0..4 {
            w.write_i16_le(if row == col { 4096 } else { 0 });
        }
    }
}

/// Version 3 model: six vertices split 3/3 between a root and its child,
/// one textured triangle
fn six_vertex_model() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bytes(b"MB").write_u8(3).write_u8(0);
    w.write_u16_le(6).write_u16_le(1).write_u16_le(0).write_u16_le(2);
    for v in [
        0i16, 0, 0, 4096, 0, 0, 0, 4096, 0, 10, 20, 30, -40, 50, 60, 70, 80, -90,
    ] {
        w.write_i16_le(v);
    }
    w.write_u16_le(0);
    w.write_u16_le(0).write_u16_le(1).write_u16_le(2);
    w.write_bytes(&[0, 0, 1, 0, 0, 1]);
    write_bone(&mut w, 3, -1);
    write_bone(&mut w, 3, 0);
    w.into_inner()
}

/// One action of one keyframe: the root stays put, the child moves 100
/// units along X
fn translation_actions() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bytes(b"MT").write_u8(3).write_u8(0);
    w.write_u16_le(1).write_u16_le(2);
    for _ in 0..8 {
        w.write_u16_le(0);
    }
    w.write_i32_le(0);
    w.write_u16_le(1);
    w.write_u8(1);
    w.write_u8(0);
    for v in [4096i16, 0, 0, 100, 0, 4096, 0, 0, 0, 0, 4096, 0] {
        w.write_i16_le(v);
    }
    w.into_inner()
}

/// 3x2 bottom-up info-header BMP whose pixel values are `x + 10 * y`
fn small_bmp() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bytes(b"BM").write_u32_le(0).write_u32_le(0);
    w.write_i32_le(14 + 40 + 1024).write_i32_le(40);
    w.write_i32_le(3).write_i32_le(2);
    w.write_u16_le(1).write_u16_le(8).write_i32_le(0);
    w.write_bytes(&[0; 20]);
    for i in 0..=255u8 {
        w.write_bytes(&[i, i, i, 0]);
    }
    for y in [1u8, 0] {
        w.write_bytes(&[10 * y, 1 + 10 * y, 2 + 10 * y, 0]);
    }
    w.into_inner()
}

fn words(list: &[i32]) -> String {
    list.iter()
        .map(|w| format!("{:#010x}", *w as u32))
        .collect::<Vec<_>>()
        .join("\n")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_mbac_info() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "six.mbac", &six_vertex_model());

    micro3d()
        .args(["mbac", "info", path_arg(&model)])
        .assert()
        .success()
        .stdout(contains("Version: 3"))
        .stdout(contains("Vertices: 6"))
        .stdout(contains("Bones: 2"))
        .stdout(contains("Bones:\n").not());
}

#[test]
fn test_mbac_info_detailed_lists_tables() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "six.mbac", &six_vertex_model());

    micro3d()
        .args(["mbac", "info", "--detailed", path_arg(&model)])
        .assert()
        .success()
        .stdout(contains("Textured Buckets"))
        .stdout(contains("Normal"))
        .stdout(contains("Patterns:"));
}

#[test]
fn test_mbac_validate_reports_each_file() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.mbac", &six_vertex_model());
    let bad = write(&dir, "bad.mbac", b"XX\x03\x00");

    micro3d()
        .args(["mbac", "validate", path_arg(&good)])
        .assert()
        .success()
        .stdout(contains("✓"));

    micro3d()
        .args(["mbac", "validate", "--parallel", path_arg(&good), path_arg(&bad)])
        .assert()
        .failure()
        .stdout(contains("✗"))
        .stderr(contains("1 of 2 files failed validation"));
}

#[test]
fn test_mtra_info_with_action() {
    let dir = TempDir::new().unwrap();
    let actions = write(&dir, "move.mtra", &translation_actions());

    micro3d()
        .args(["mtra", "info", "--action", "0", path_arg(&actions)])
        .assert()
        .success()
        .stdout(contains("Actions: 1"))
        .stdout(contains("static matrix"))
        .stdout(contains("identity"));

    micro3d()
        .args(["mtra", "info", "--action", "3", path_arg(&actions)])
        .assert()
        .failure()
        .stderr(contains("out of range"));
}

#[test]
fn test_pose_moves_child_vertices() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "six.mbac", &six_vertex_model());
    let actions = write(&dir, "move.mtra", &translation_actions());

    micro3d()
        .args(["pose", path_arg(&model), path_arg(&actions)])
        .assert()
        .success()
        .stdout(contains("110.0"));

    micro3d()
        .args(["pose", "--real", path_arg(&model), path_arg(&actions)])
        .assert()
        .success()
        .stdout(contains("0.0269"));

    micro3d()
        .args(["pose", "--action", "2", path_arg(&model), path_arg(&actions)])
        .assert()
        .failure();
}

#[test]
fn test_bmp_info() {
    let dir = TempDir::new().unwrap();
    let bmp = write(&dir, "small.bmp", &small_bmp());

    micro3d()
        .args(["bmp", "info", path_arg(&bmp)])
        .assert()
        .success()
        .stdout(contains("Dimensions: 3x2"))
        .stdout(contains("bottom-up"))
        .stdout(contains("Color-keyed Pixels: 1 of 6"));
}

#[cfg(feature = "image")]
#[test]
fn test_bmp_convert_writes_png() {
    let dir = TempDir::new().unwrap();
    let bmp = write(&dir, "small.bmp", &small_bmp());
    let png = dir.path().join("small.png");

    micro3d()
        .args(["bmp", "convert", path_arg(&bmp), path_arg(&png)])
        .assert()
        .success();

    let data = fs::read(&png).unwrap();
    assert_eq!(&data[..4], b"\x89PNG");
}

#[test]
fn test_cmdlist_run_prints_draw_log() {
    let dir = TempDir::new().unwrap();
    let mut list = vec![VERSION_1_0 as i32, PARALLEL_SCALE as i32, 4096, 4096];
    list.push(PRIMITIVE_TRIANGLES | 1 << 16 | PDATA_COLOR_PER_COMMAND);
    list.extend_from_slice(&[0, 0, 0, 100, 0, 0, 0, 100, 0]);
    list.push(0x0012_3456);
    list.push(END as i32);
    let text = format!("# one colored triangle\n{}\n", words(&list));
    let file = write(&dir, "list.txt", text.as_bytes());

    micro3d()
        .args(["cmdlist", "run", "--center", "120,160", path_arg(&file)])
        .assert()
        .success()
        .stdout(contains("color #123456"))
        .stdout(contains("1 primitive batches, 1 draws"));
}

#[test]
fn test_cmdlist_run_rejects_bad_version() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "list.txt", b"0xFE000002 0x10000000");

    micro3d()
        .args(["cmdlist", "run", path_arg(&file)])
        .assert()
        .failure()
        .stderr(contains("Command list rejected"));
}

#[test]
fn test_cmdlist_run_rejects_bad_words() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "list.txt", b"0xFE000001\nbanana");

    micro3d()
        .args(["cmdlist", "run", path_arg(&file)])
        .assert()
        .failure()
        .stderr(contains("Failed to parse command list"));
}
