//! Types for engine-native meshes

use bytemuck::cast_slice;
use glam::Vec3;
use thiserror::Error;

/// Largest index count that still fits 16-bit indices
pub(crate) const MAX_INDEX16_COUNT: usize = u16::MAX as usize;

/// Semantic of a mesh stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshFeature {
    Vertices,
    Normals,
    UVSet0,
    UVSet1,
    Tangents,
    BoneWeights,
    BoneIndices,
    Indices,
}

/// Element layout of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementFormat {
    Float2,
    Float3,
    Float4,
    UInt4,
    UInt16,
    UInt32,
}

impl ElementFormat {
    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 | Self::UInt4 => 16,
            Self::UInt16 => 2,
            Self::UInt32 => 4,
        }
    }

    /// Number of scalar components per element
    pub const fn components(self) -> usize {
        match self {
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 | Self::UInt4 => 4,
            Self::UInt16 | Self::UInt32 => 1,
        }
    }

    fn zeroed(self, count: usize) -> StreamData {
        match self {
            Self::Float2 => StreamData::Float2(vec![[0.0; 2]; count]),
            Self::Float3 => StreamData::Float3(vec![[0.0; 3]; count]),
            Self::Float4 => StreamData::Float4(vec![[0.0; 4]; count]),
            Self::UInt4 => StreamData::UInt4(vec![[0; 4]; count]),
            Self::UInt16 => StreamData::UInt16(vec![0; count]),
            Self::UInt32 => StreamData::UInt32(vec![0; count]),
        }
    }
}

/// Declaration of one stream before any data is written
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshDescriptor {
    pub feature: MeshFeature,
    pub format: ElementFormat,
}

impl MeshDescriptor {
    pub const fn new(feature: MeshFeature, format: ElementFormat) -> Self {
        Self { feature, format }
    }

    pub const fn element_size(&self) -> usize {
        self.format.size()
    }
}

/// Typed, contiguous backing storage of a stream
#[derive(Clone, Debug, PartialEq)]
pub enum StreamData {
    Float2(Vec<[f32; 2]>),
    Float3(Vec<[f32; 3]>),
    Float4(Vec<[f32; 4]>),
    UInt4(Vec<[u32; 4]>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
}

impl StreamData {
    pub fn format(&self) -> ElementFormat {
        match self {
            Self::Float2(_) => ElementFormat::Float2,
            Self::Float3(_) => ElementFormat::Float3,
            Self::Float4(_) => ElementFormat::Float4,
            Self::UInt4(_) => ElementFormat::UInt4,
            Self::UInt16(_) => ElementFormat::UInt16,
            Self::UInt32(_) => ElementFormat::UInt32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float2(v) => v.len(),
            Self::Float3(v) => v.len(),
            Self::Float4(v) => v.len(),
            Self::UInt4(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw little-endian bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float2(v) => cast_slice(v),
            Self::Float3(v) => cast_slice(v),
            Self::Float4(v) => cast_slice(v),
            Self::UInt4(v) => cast_slice(v),
            Self::UInt16(v) => cast_slice(v),
            Self::UInt32(v) => cast_slice(v),
        }
    }
}

/// A declared stream and its data
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeStream {
    pub descriptor: MeshDescriptor,
    pub data: StreamData,
}

impl AttributeStream {
    pub fn feature(&self) -> MeshFeature {
        self.descriptor.feature
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Axis-aligned box plus enclosing sphere of the vertex positions
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingVolumes {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("stream {0:?} was not declared for this mesh")]
    UndeclaredFeature(MeshFeature),

    #[error("stream {feature:?} expects {expected:?} elements, got {actual:?}")]
    FormatMismatch {
        feature: MeshFeature,
        expected: ElementFormat,
        actual: ElementFormat,
    },

    #[error("stream {feature:?} expects {expected} elements, got {actual}")]
    CountMismatch {
        feature: MeshFeature,
        expected: usize,
        actual: usize,
    },
}

/// Engine-native mesh: fixed counts, one stream per declared feature
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    vertex_count: usize,
    index_count: usize,
    streams: Vec<AttributeStream>,
    bounds: BoundingVolumes,
}

impl Mesh {
    /// Declare the streams and fix vertex/index counts.
    ///
    /// Every stream is allocated zeroed; the `Indices` stream holds
    /// `index_count` elements, all others `vertex_count`.
    pub fn new(descriptors: Vec<MeshDescriptor>, vertex_count: usize, index_count: usize) -> Self {
        let streams = descriptors
            .into_iter()
            .map(|descriptor| {
                let count = if descriptor.feature == MeshFeature::Indices {
                    index_count
                } else {
                    vertex_count
                };
                AttributeStream {
                    descriptor,
                    data: descriptor.format.zeroed(count),
                }
            })
            .collect();

        Self {
            vertex_count,
            index_count,
            streams,
            bounds: BoundingVolumes::default(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn bounds(&self) -> BoundingVolumes {
        self.bounds
    }

    pub fn has_feature(&self, feature: MeshFeature) -> bool {
        self.stream(feature).is_some()
    }

    pub fn stream(&self, feature: MeshFeature) -> Option<&AttributeStream> {
        self.streams.iter().find(|s| s.feature() == feature)
    }

    /// Vertex attribute streams in declaration order (no index stream)
    pub fn attribute_streams(&self) -> impl Iterator<Item = &AttributeStream> {
        self.streams
            .iter()
            .filter(|s| s.feature() != MeshFeature::Indices)
    }

    pub fn index_stream(&self) -> Option<&AttributeStream> {
        self.stream(MeshFeature::Indices)
    }

    /// Replace the contents of a declared stream.
    ///
    /// The data must match the declared format and element count.
    pub fn set_data(&mut self, feature: MeshFeature, data: StreamData) -> Result<(), MeshError> {
        let expected_count = if feature == MeshFeature::Indices {
            self.index_count
        } else {
            self.vertex_count
        };
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.feature() == feature)
            .ok_or(MeshError::UndeclaredFeature(feature))?;

        if stream.descriptor.format != data.format() {
            return Err(MeshError::FormatMismatch {
                feature,
                expected: stream.descriptor.format,
                actual: data.format(),
            });
        }
        if data.len() != expected_count {
            return Err(MeshError::CountMismatch {
                feature,
                expected: expected_count,
                actual: data.len(),
            });
        }

        stream.data = data;
        Ok(())
    }

    /// Recompute bounding volumes from the `Vertices` stream
    pub fn calculate_bounds(&mut self) {
        let bounds = match self.stream(MeshFeature::Vertices).map(|s| &s.data) {
            Some(StreamData::Float3(positions)) => bounding_volumes(positions),
            _ => return,
        };
        self.bounds = bounds;
    }
}

fn bounding_volumes(positions: &[[f32; 3]]) -> BoundingVolumes {
    if positions.is_empty() {
        return BoundingVolumes::default();
    }

    let (min, max) = positions.iter().map(|p| Vec3::from_array(*p)).fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), p| (min.min(p), max.max(p)),
    );
    let center = (min + max) * 0.5;
    let radius = positions
        .iter()
        .map(|p| Vec3::from_array(*p).distance(center))
        .fold(0.0f32, f32::max);

    BoundingVolumes {
        min,
        max,
        center,
        radius,
    }
}
