//! Byte layout for shipping images between ranks.
//!
//! Header (little-endian): `u32` partition, `i32` x_min, x_max, y_min,
//! y_max, `u8` flags. Then the pixel buffer (`w*h*4` `f32`), the depth buffer
//! (`w*h` `f32`) when `HAS_DEPTH` is set and the provenance buffer (`w*h`
//! `u32`) when `HAS_ORIGINS` is set. Bulk buffers are copied in host byte
//! order; all ranks of one job share an architecture.

use bitflags::bitflags;

use super::bounds::Bounds;
use super::buffer::{CHANNELS, Image, PartitionId};
use crate::error::CompositeError;

bitflags! {
    /// Which optional buffers follow the pixel buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WireFlags: u8 {
        const HAS_DEPTH = 0b0000_0001;
        const HAS_ORIGINS = 0b0000_0010;
    }
}

pub(crate) const HEADER_LEN: usize = 4 + 4 * 4 + 1;

impl Image {
    /// Serialize bounds, buffers and partition id.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.num_pixels();
        let mut flags = WireFlags::empty();
        flags.set(WireFlags::HAS_DEPTH, self.depths.is_some());
        flags.set(WireFlags::HAS_ORIGINS, self.depths.is_some() && self.origins.is_some());

        let mut out = Vec::with_capacity(HEADER_LEN + n * (CHANNELS + 2) * 4);
        out.extend_from_slice(&self.partition.to_le_bytes());
        for v in [self.bounds.x_min, self.bounds.x_max, self.bounds.y_min, self.bounds.y_max] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.push(flags.bits());
        out.extend_from_slice(bytemuck::cast_slice(&self.pixels));
        if let Some(d) = &self.depths {
            out.extend_from_slice(bytemuck::cast_slice(d));
        }
        if flags.contains(WireFlags::HAS_ORIGINS) {
            if let Some(o) = &self.origins {
                out.extend_from_slice(bytemuck::cast_slice(o));
            }
        }
        out
    }

    /// Rebuild an image from `to_bytes` output. The slice must hold exactly
    /// one image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Image, CompositeError> {
        let mut r = Reader::new(bytes);
        let partition: PartitionId = r.u32()?;
        let bounds = Bounds::new(r.i32()?, r.i32()?, r.i32()?, r.i32()?);
        let flags = WireFlags::from_bits(r.u8()?)
            .ok_or_else(|| CompositeError::MalformedMessage("unknown flag bits".into()))?;
        // Empty rectangles all decode to the canonical one.
        let bounds = if bounds.is_empty() { Bounds::empty() } else { bounds };
        let n = bounds.area();
        let pixels = r.pod_vec::<f32>(n.checked_mul(CHANNELS).ok_or_else(too_large)?)?;
        let depths = if flags.contains(WireFlags::HAS_DEPTH) { Some(r.pod_vec::<f32>(n)?) } else { None };
        let origins = if flags.contains(WireFlags::HAS_ORIGINS) {
            if depths.is_none() {
                return Err(CompositeError::MalformedMessage("provenance without depth".into()));
            }
            Some(r.pod_vec::<PartitionId>(n)?)
        } else {
            None
        };
        r.finish()?;
        Ok(Image { bounds, pixels, depths, origins, partition })
    }
}

fn too_large() -> CompositeError {
    CompositeError::MalformedMessage("image dimensions overflow".into())
}

/// Forward-only cursor over a received message.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], CompositeError> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.bytes.len()).ok_or_else(|| {
            CompositeError::MalformedMessage(format!(
                "need {len} bytes at offset {}, message has {}",
                self.pos,
                self.bytes.len()
            ))
        })?;
        let s = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, CompositeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, CompositeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, CompositeError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, CompositeError> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    /// Copy `count` plain values out of the (possibly unaligned) message.
    fn pod_vec<T: bytemuck::Pod>(&mut self, count: usize) -> Result<Vec<T>, CompositeError> {
        let len = count.checked_mul(std::mem::size_of::<T>()).ok_or_else(too_large)?;
        let src = self.take(len)?;
        let mut v = vec![<T as bytemuck::Zeroable>::zeroed(); count];
        bytemuck::cast_slice_mut::<T, u8>(&mut v).copy_from_slice(src);
        Ok(v)
    }

    pub(crate) fn finish(&self) -> Result<(), CompositeError> {
        if self.pos != self.bytes.len() {
            return Err(CompositeError::MalformedMessage(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
