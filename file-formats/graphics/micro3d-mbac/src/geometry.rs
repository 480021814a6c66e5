//! Vertex position and normal sections

use glam::Vec3;
use log::*;
use micro3d_data::{BitReader, ByteReader, fixed};

use crate::error::{MbacError, Result};

/// Field widths selected by the top two bits of a packed-run control byte
const RUN_WIDTHS: [u32; 4] = [8, 10, 13, 16];

/// Axis-aligned normals addressed by the compressed-normal escape code
const POOLED_NORMALS: [i32; 8] = [0, 0, 4096, 0, 0, -4096, 0, 0];

/// Escape value of the 7-bit x field
const NORMAL_ESCAPE: u32 = 64;

fn read_i16_vec(reader: &mut BitReader<'_>) -> Result<Vec3> {
    Ok(Vec3::new(
        f32::from(reader.read_i16_le()?),
        f32::from(reader.read_i16_le()?),
        f32::from(reader.read_i16_le()?),
    ))
}

/// Read `count` vertex positions in the given format
pub fn read_vertices(reader: &mut BitReader<'_>, format: u8, count: usize) -> Result<Vec<Vec3>> {
    let mut vertices = Vec::with_capacity(count);
    match format {
        1 => {
            for _ in 0..count {
                vertices.push(read_i16_vec(reader)?);
            }
        }
        2 => {
            while vertices.len() < count {
                let control = reader.read_ubits(8)?;
                let width = RUN_WIDTHS[(control >> 6) as usize];
                let run = (control & 0x3F) as usize + 1;
                let remaining = count - vertices.len();
                if run > remaining {
                    return Err(MbacError::VertexRunOverflow { run, remaining });
                }
                trace!("vertex run of {run} at {width} bits");
                for _ in 0..run {
                    let x = reader.read_bits(width)?;
                    let y = reader.read_bits(width)?;
                    let z = reader.read_bits(width)?;
                    vertices.push(Vec3::new(x as f32, y as f32, z as f32));
                }
            }
        }
        other => {
            return Err(MbacError::UnsupportedFormat {
                kind: "vertex",
                value: other,
            });
        }
    }
    Ok(vertices)
}

/// Sign-extend a 7-bit field and scale it to the 4096 range
#[inline]
fn expand_normal_axis(raw: u32) -> i32 {
    ((raw << 25) as i32) >> 19
}

fn read_compressed_normal(reader: &mut BitReader<'_>) -> Result<[i32; 3]> {
    let raw_x = reader.read_ubits(7)?;
    if raw_x == NORMAL_ESCAPE {
        let code = reader.read_ubits(3)?;
        if code > 5 {
            return Err(MbacError::InvalidNormal(code));
        }
        let t = code as usize;
        return Ok([
            POOLED_NORMALS[t + 2],
            POOLED_NORMALS[t + 1],
            POOLED_NORMALS[t],
        ]);
    }
    let x = expand_normal_axis(raw_x);
    let y = expand_normal_axis(reader.read_ubits(7)?);
    let negative = reader.read_ubits(1)? == 1;
    let rest = (fixed::ONE * fixed::ONE)
        .wrapping_sub(x.wrapping_mul(x))
        .wrapping_sub(y.wrapping_mul(y));
    let z = if rest > 0 {
        fixed::sqrt(rest).unwrap_or(0)
    } else {
        0
    };
    Ok([x, y, if negative { -z } else { z }])
}

/// Read `count` normals in the given format (1 or 2)
pub fn read_normals(reader: &mut BitReader<'_>, format: u8, count: usize) -> Result<Vec<Vec3>> {
    let mut normals = Vec::with_capacity(count);
    match format {
        1 => {
            for _ in 0..count {
                normals.push(read_i16_vec(reader)?);
            }
        }
        2 => {
            for _ in 0..count {
                let [x, y, z] = read_compressed_normal(reader)?;
                normals.push(Vec3::new(x as f32, y as f32, z as f32));
            }
        }
        other => {
            return Err(MbacError::UnsupportedFormat {
                kind: "normal",
                value: other,
            });
        }
    }
    Ok(normals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro3d_data::BitWriter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_packed_vertex_runs() {
        let mut w = BitWriter::new();
        // run of 2 at 8 bits, then run of 1 at 16 bits
        w.write_bits(1, 8);
        for v in [1i32, -2, 3, -128, 127, 0] {
            w.write_bits(v as u32, 8);
        }
        w.write_bits(0b1100_0000, 8);
        for v in [-30000i32, 30000, 5] {
            w.write_bits(v as u32, 16);
        }
        let data = w.into_inner();
        let vertices = read_vertices(&mut BitReader::new(&data), 2, 3).unwrap();
        assert_eq!(
            vertices,
            vec![
                Vec3::new(1.0, -2.0, 3.0),
                Vec3::new(-128.0, 127.0, 0.0),
                Vec3::new(-30000.0, 30000.0, 5.0),
            ]
        );
    }

    #[test]
    fn test_vertex_run_longer_than_remaining() {
        let mut w = BitWriter::new();
        w.write_bits(3, 8); // run of 4
        let data = w.into_inner();
        assert_eq!(
            read_vertices(&mut BitReader::new(&data), 2, 2),
            Err(MbacError::VertexRunOverflow {
                run: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_pooled_normals() {
        let mut w = BitWriter::new();
        for code in [0, 1, 2, 3, 4, 5] {
            w.write_bits(NORMAL_ESCAPE, 7).write_bits(code, 3);
        }
        let data = w.into_inner();
        let normals = read_normals(&mut BitReader::new(&data), 2, 6).unwrap();
        assert_eq!(normals[0], Vec3::new(4096.0, 0.0, 0.0));
        assert_eq!(normals[1], Vec3::new(0.0, 4096.0, 0.0));
        assert_eq!(normals[2], Vec3::new(0.0, 0.0, 4096.0));
        assert_eq!(normals[3], Vec3::new(-4096.0, 0.0, 0.0));
        assert_eq!(normals[4], Vec3::new(0.0, -4096.0, 0.0));
        assert_eq!(normals[5], Vec3::new(0.0, 0.0, -4096.0));
    }

    #[test]
    fn test_invalid_pooled_normal() {
        let mut w = BitWriter::new();
        w.write_bits(NORMAL_ESCAPE, 7).write_bits(6, 3);
        let data = w.into_inner();
        assert_eq!(
            read_normals(&mut BitReader::new(&data), 2, 1),
            Err(MbacError::InvalidNormal(6))
        );
    }

    #[test]
    fn test_compressed_normal_rebuilds_z() {
        let mut w = BitWriter::new();
        // x = 0, y = 0, negative z
        w.write_bits(0, 7).write_bits(0, 7).write_bits(1, 1);
        // x = 32 << 6 = 2048, y = 0, positive z
        w.write_bits(32, 7).write_bits(0, 7).write_bits(0, 1);
        let data = w.into_inner();
        let normals = read_normals(&mut BitReader::new(&data), 2, 2).unwrap();
        assert_eq!(normals[0], Vec3::new(0.0, 0.0, -4096.0));
        // sqrt(4096^2 - 2048^2) = 3547.24
        assert_eq!(normals[1], Vec3::new(2048.0, 0.0, 3547.0));
    }
}
