// Copyright @yucwang 2026

use crate::math::constants::Float;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl DataType {
    /// Element types voxel fields may be stored in.
    pub fn is_voxel_type(self) -> bool {
        matches!(
            self,
            DataType::UChar | DataType::Short | DataType::UShort | DataType::Float | DataType::Double
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataBuffer {
    UChar(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl DataBuffer {
    fn raw_len(&self) -> usize {
        match self {
            DataBuffer::UChar(v) => v.len(),
            DataBuffer::Short(v) => v.len(),
            DataBuffer::UShort(v) => v.len(),
            DataBuffer::Int(v) => v.len(),
            DataBuffer::UInt(v) => v.len(),
            DataBuffer::Float(v) => v.len(),
            DataBuffer::Double(v) => v.len(),
        }
    }
}

/// A typed parameter array. `stride` counts elements of the underlying
/// buffer between two logical items; 1 is compact.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    buffer: DataBuffer,
    stride: usize,
}

impl Data {
    pub fn new(buffer: DataBuffer) -> Self {
        Self { buffer, stride: 1 }
    }

    pub fn strided(buffer: DataBuffer, stride: usize) -> Self {
        Self { buffer, stride: stride.max(1) }
    }

    pub fn data_type(&self) -> DataType {
        match &self.buffer {
            DataBuffer::UChar(_) => DataType::UChar,
            DataBuffer::Short(_) => DataType::Short,
            DataBuffer::UShort(_) => DataType::UShort,
            DataBuffer::Int(_) => DataType::Int,
            DataBuffer::UInt(_) => DataType::UInt,
            DataBuffer::Float(_) => DataType::Float,
            DataBuffer::Double(_) => DataType::Double,
        }
    }

    pub fn len(&self) -> usize {
        (self.buffer.raw_len() + self.stride - 1) / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compact(&self) -> bool {
        self.stride == 1
    }

    pub fn buffer(&self) -> &DataBuffer {
        &self.buffer
    }

    /// Element `i` widened to `Float`.
    #[inline]
    pub fn scalar(&self, i: usize) -> Float {
        let idx = i * self.stride;
        match &self.buffer {
            DataBuffer::UChar(v) => v[idx] as Float,
            DataBuffer::Short(v) => v[idx] as Float,
            DataBuffer::UShort(v) => v[idx] as Float,
            DataBuffer::Int(v) => v[idx] as Float,
            DataBuffer::UInt(v) => v[idx] as Float,
            DataBuffer::Float(v) => v[idx],
            DataBuffer::Double(v) => v[idx] as Float,
        }
    }

    pub fn to_f32_vec(&self) -> Vec<Float> {
        (0..self.len()).map(|i| self.scalar(i)).collect()
    }
}

impl From<Vec<f32>> for Data {
    fn from(v: Vec<f32>) -> Self {
        Data::new(DataBuffer::Float(v))
    }
}

impl From<Vec<f64>> for Data {
    fn from(v: Vec<f64>) -> Self {
        Data::new(DataBuffer::Double(v))
    }
}

impl From<Vec<u8>> for Data {
    fn from(v: Vec<u8>) -> Self {
        Data::new(DataBuffer::UChar(v))
    }
}

impl From<Vec<i16>> for Data {
    fn from(v: Vec<i16>) -> Self {
        Data::new(DataBuffer::Short(v))
    }
}

impl From<Vec<u16>> for Data {
    fn from(v: Vec<u16>) -> Self {
        Data::new(DataBuffer::UShort(v))
    }
}

impl From<Vec<i32>> for Data {
    fn from(v: Vec<i32>) -> Self {
        Data::new(DataBuffer::Int(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_data_skips_elements() {
        let d = Data::strided(DataBuffer::Float(vec![1.0, -1.0, 2.0, -1.0, 3.0]), 2);
        assert_eq!(d.len(), 3);
        assert!(!d.is_compact());
        assert_eq!(d.to_f32_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn scalar_conversion() {
        let d: Data = vec![200u8, 3u8].into();
        assert_eq!(d.data_type(), DataType::UChar);
        assert_eq!(d.scalar(0), 200.0);
        let s: Data = vec![-4i16].into();
        assert_eq!(s.scalar(0), -4.0);
        assert!(DataType::Short.is_voxel_type());
        assert!(!DataType::Int.is_voxel_type());
    }
}
