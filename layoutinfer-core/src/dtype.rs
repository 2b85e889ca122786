use std::fmt::Debug;

#[cfg(feature = "bfloat")]
use half::bf16;
#[cfg(feature = "half")]
use half::f16;

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    Float16,
    BFloat16,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(&self) -> usize {
        match self {
            Self::Bool8 | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool8 => "bool8",
            Self::Int8 => "i8",
            Self::UInt8 => "u8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        }
    }
}

/// Marker trait for host types that can back a constant tensor.
///
/// Values are stored little-endian regardless of the host.
pub trait Element: Debug + Copy + Send + Sync {
    const DATA_TYPE: DataType;

    fn write_le(&self, out: &mut Vec<u8>);

    fn read_le(bytes: &[u8]) -> Self;

    /// Serialize a slice into a constant buffer.
    fn to_bytes(values: &[Self]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * Self::DATA_TYPE.size_in_bytes());
        for v in values {
            v.write_le(&mut out);
        }
        out
    }

    /// Deserialize a constant buffer. Trailing bytes that do not form a full
    /// element are ignored.
    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::DATA_TYPE.size_in_bytes())
            .map(Self::read_le)
            .collect()
    }
}

macro_rules! element {
    ($rt:ty, $dt:ident) => {
        impl Element for $rt {
            const DATA_TYPE: DataType = DataType::$dt;

            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$rt>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$rt>()]);
                <$rt>::from_le_bytes(buf)
            }
        }
    };
}

element!(i8, Int8);
element!(u8, UInt8);
element!(i16, Int16);
element!(u16, UInt16);
element!(i32, Int32);
element!(u32, UInt32);
element!(i64, Int64);
element!(f32, Float32);
element!(f64, Float64);
#[cfg(feature = "half")]
element!(f16, Float16);
#[cfg(feature = "bfloat")]
element!(bf16, BFloat16);

impl Element for bool {
    const DATA_TYPE: DataType = DataType::Bool8;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
