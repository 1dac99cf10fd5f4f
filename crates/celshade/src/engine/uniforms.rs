use std::collections::HashMap;

use glam::{Mat4, Vec3};
use tracing::warn;

use super::TextureHandle;

/// A value pushed to a named shader uniform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Receiver of uniform values and texture unit bindings right before a draw.
pub trait UniformSink {
    fn set_uniform(&mut self, name: &str, value: UniformValue);
    fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>);
}

/// Type of a uniform block member, as reflected from the shader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UniformType {
    Int,
    Uint,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformSlot {
    /// Byte offset inside the uniform block.
    pub offset: usize,
    pub ty: UniformType,
}

/// Layout of a stage's uniform block: flattened member names to slots.
///
/// Struct members are named `Outer.Inner`, array elements `Array[i]`.
#[derive(Clone, Debug, Default)]
pub struct UniformBlockLayout {
    pub binding: u32,
    pub size: usize,
    pub slots: HashMap<String, UniformSlot>,
}

/// CPU copy of a uniform block. Values persist until overwritten.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    data: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: &UniformBlockLayout) -> Self {
        Self {
            data: vec![0; layout.size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Writes `value` into `slot`. Returns false when the types don't match.
    pub fn write(&mut self, name: &str, slot: &UniformSlot, value: &UniformValue) -> bool {
        match (slot.ty, value) {
            (UniformType::Int, UniformValue::Int(v)) => self.put(slot.offset, bytemuck::bytes_of(v)),
            (UniformType::Uint, UniformValue::Int(v)) if *v >= 0 => {
                self.put(slot.offset, bytemuck::bytes_of(&(*v as u32)))
            }
            (UniformType::Float, UniformValue::Float(v)) => {
                self.put(slot.offset, bytemuck::bytes_of(v))
            }
            (UniformType::Vec3 | UniformType::Vec4, UniformValue::Vec3(v)) => {
                self.put(slot.offset, bytemuck::cast_slice(&v.to_array()))
            }
            (UniformType::Mat4, UniformValue::Mat4(m)) => {
                self.put(slot.offset, bytemuck::cast_slice(&m.to_cols_array()))
            }
            _ => {
                warn!("Uniform '{name}' is {:?}, cannot assign {value:?}", slot.ty);
                false
            }
        }
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) -> bool {
        let Some(target) = self.data.get_mut(offset..offset + bytes.len()) else {
            warn!("Uniform write at {offset} overflows block of {} bytes", self.data.len());
            return false;
        };
        target.copy_from_slice(bytes);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UniformBlockLayout {
        let slots = [
            ("Matrix", 0, UniformType::Mat4),
            ("Position", 64, UniformType::Vec3),
            ("Strength", 76, UniformType::Float),
            ("Count", 80, UniformType::Int),
        ]
        .into_iter()
        .map(|(name, offset, ty)| (name.to_string(), UniformSlot { offset, ty }))
        .collect();
        UniformBlockLayout {
            binding: 0,
            size: 96,
            slots,
        }
    }

    fn read_f32(block: &UniformBlock, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&block.as_bytes()[offset..offset + 4])
    }

    #[test]
    fn writes_land_at_reflected_offsets() {
        let layout = layout();
        let mut block = UniformBlock::new(&layout);

        let matrix = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        assert!(block.write("Matrix", &layout.slots["Matrix"], &UniformValue::Mat4(matrix)));
        let position = UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0));
        assert!(block.write("Position", &layout.slots["Position"], &position));
        assert!(block.write("Strength", &layout.slots["Strength"], &UniformValue::Float(0.5)));
        assert!(block.write("Count", &layout.slots["Count"], &UniformValue::Int(3)));

        // Translation lives in the fourth column
        assert_eq!(read_f32(&block, 48), 7.0);
        assert_eq!(read_f32(&block, 64), 1.0);
        assert_eq!(read_f32(&block, 72), 3.0);
        assert_eq!(read_f32(&block, 76), 0.5);
        let count: i32 = bytemuck::pod_read_unaligned(&block.as_bytes()[80..84]);
        assert_eq!(count, 3);
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let layout = layout();
        let mut block = UniformBlock::new(&layout);
        assert!(!block.write("Count", &layout.slots["Count"], &UniformValue::Float(1.0)));
        assert!(block.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_bounds_slot_is_rejected() {
        let mut block = UniformBlock::new(&UniformBlockLayout {
            binding: 0,
            size: 8,
            slots: HashMap::new(),
        });
        let slot = UniformSlot {
            offset: 4,
            ty: UniformType::Vec3,
        };
        assert!(!block.write("Tail", &slot, &UniformValue::Vec3(Vec3::ONE)));
    }
}
