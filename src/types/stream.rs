//! The `ElementStream` builder.
//!
//! A stream is an ordered list of `StreamElement`s plus the few stream-wide
//! facts the compressor needs up front: the buffer type, the vertex layout,
//! and the color kind. Every `add_*` method validates its input completely
//! before appending anything, so a rejected call leaves the stream unchanged.
//!
//! The builder keeps its own copy of the decoder's mesh buffer keys. It uses
//! them to check that mesh references address a pushed vertex and, for
//! indexed geometry, to replace repeated vertices with references.

use crate::config::{CompressorConfig, MeshReusePolicy};
use crate::error::MeshpackError;
use crate::pipeline::mesh_buffer::{IndexKey, MeshBuffer, PointKey, MESH_BUFFER_SIZE};
use crate::types::element::{
    BufferType, Color, ColorKind, QuantizationTarget, ReplaceCode, StreamElement, Vertex,
    VertexLayout,
};

//==================================================================================
// 1. Vertex Arrays
//==================================================================================

/// Per-vertex colors, all with or all without alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorArray<'a> {
    Rgb(&'a [[f32; 3]]),
    Rgba(&'a [[f32; 4]]),
}

impl<'a> ColorArray<'a> {
    pub fn len(&self) -> usize {
        match self {
            ColorArray::Rgb(c) => c.len(),
            ColorArray::Rgba(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColorKind {
        match self {
            ColorArray::Rgb(_) => ColorKind::Rgb,
            ColorArray::Rgba(_) => ColorKind::Rgba,
        }
    }

    fn get(&self, i: usize) -> Color {
        match self {
            ColorArray::Rgb(c) => Color::Rgb(c[i]),
            ColorArray::Rgba(c) => Color::Rgba(c[i]),
        }
    }

    fn flat(&self) -> &'a [f32] {
        match *self {
            ColorArray::Rgb(c) => bytemuck::cast_slice(c),
            ColorArray::Rgba(c) => bytemuck::cast_slice(c),
        }
    }
}

/// Borrowed per-vertex attribute arrays, addressed by a common vertex index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexArrays<'a> {
    pub positions: &'a [[f32; 3]],
    pub normals: Option<&'a [[f32; 3]]>,
    pub colors: Option<ColorArray<'a>>,
}

impl<'a> VertexArrays<'a> {
    pub fn new(positions: &'a [[f32; 3]]) -> Self {
        Self {
            positions,
            normals: None,
            colors: None,
        }
    }

    pub fn with_normals(mut self, normals: &'a [[f32; 3]]) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_colors(mut self, colors: ColorArray<'a>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Reinterprets flat, tightly packed float arrays (`xyzxyz...`).
    pub fn from_flat(
        positions: &'a [f32],
        normals: Option<&'a [f32]>,
        colors: Option<(&'a [f32], ColorKind)>,
    ) -> Result<Self, MeshpackError> {
        fn check(flat: &[f32], stride: usize, what: &str) -> Result<(), MeshpackError> {
            if flat.len() % stride != 0 {
                return Err(MeshpackError::InvalidInput(format!(
                    "{} array length {} is not a multiple of {}",
                    what,
                    flat.len(),
                    stride
                )));
            }
            Ok(())
        }

        check(positions, 3, "position")?;
        let mut arrays = VertexArrays::new(bytemuck::try_cast_slice(positions)?);
        if let Some(normals) = normals {
            check(normals, 3, "normal")?;
            arrays.normals = Some(bytemuck::try_cast_slice(normals)?);
        }
        if let Some((colors, kind)) = colors {
            check(colors, kind.component_count(), "color")?;
            arrays.colors = Some(match kind {
                ColorKind::Rgb => ColorArray::Rgb(bytemuck::try_cast_slice(colors)?),
                ColorKind::Rgba => ColorArray::Rgba(bytemuck::try_cast_slice(colors)?),
            });
        }
        Ok(arrays)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn layout(&self) -> VertexLayout {
        VertexLayout {
            normals: self.normals.is_some(),
            colors: self.colors.map(|c| c.kind()),
        }
    }

    fn validate(&self) -> Result<(), MeshpackError> {
        let n = self.len();
        if let Some(normals) = self.normals {
            if normals.len() != n {
                return Err(MeshpackError::InvalidInput(format!(
                    "{} normals for {} positions",
                    normals.len(),
                    n
                )));
            }
            check_finite(bytemuck::cast_slice(normals), "normal")?;
        }
        if let Some(colors) = self.colors {
            if colors.len() != n {
                return Err(MeshpackError::InvalidInput(format!(
                    "{} colors for {} positions",
                    colors.len(),
                    n
                )));
            }
            check_finite(colors.flat(), "color")?;
        }
        check_finite(bytemuck::cast_slice(self.positions), "position")
    }

    fn vertex(&self, i: usize, replace: ReplaceCode, mesh_push: bool) -> Vertex {
        Vertex {
            position: self.positions[i],
            normal: self.normals.map(|n| n[i]),
            color: self.colors.map(|c| c.get(i)),
            replace,
            mesh_push,
        }
    }
}

fn check_finite(values: &[f32], what: &str) -> Result<(), MeshpackError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(MeshpackError::InvalidInput(format!(
            "non-finite {} component at offset {}",
            what, i
        ))),
        None => Ok(()),
    }
}

//==================================================================================
// 2. The Element Stream
//==================================================================================

#[derive(Debug, Clone)]
pub struct ElementStream {
    elements: Vec<StreamElement>,
    buffer_type: Option<BufferType>,
    layout: Option<VertexLayout>,
    color_kind: Option<ColorKind>,
    reuse: MeshReusePolicy,
    history: MeshBuffer,
    vertex_count: usize,
    mesh_reference_count: usize,
}

impl Default for ElementStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementStream {
    pub fn new() -> Self {
        Self::with_policy(MeshReusePolicy::default())
    }

    pub fn with_policy(reuse: MeshReusePolicy) -> Self {
        Self {
            elements: Vec::new(),
            buffer_type: None,
            layout: None,
            color_kind: None,
            reuse,
            history: MeshBuffer::new(),
            vertex_count: 0,
            mesh_reference_count: 0,
        }
    }

    pub fn from_config(config: &CompressorConfig) -> Self {
        Self::with_policy(config.mesh_reuse)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.buffer_type = None;
        self.layout = None;
        self.color_kind = None;
        self.history.clear();
        self.vertex_count = 0;
        self.mesh_reference_count = 0;
    }

    // --- Accessors ---

    pub fn elements(&self) -> &[StreamElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The buffer type fixed by the first primitive, if any.
    pub fn buffer_type(&self) -> Option<BufferType> {
        self.buffer_type
    }

    /// The component set every vertex carries; empty if no vertex was added.
    pub fn layout(&self) -> VertexLayout {
        self.layout.unwrap_or_default()
    }

    /// The color kind shared by all vertex and global colors.
    pub fn color_kind(&self) -> Option<ColorKind> {
        self.color_kind
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn mesh_reference_count(&self) -> usize {
        self.mesh_reference_count
    }

    pub fn reuse_policy(&self) -> MeshReusePolicy {
        self.reuse
    }

    // --- Consistency ---

    /// Checks a prospective buffer type, vertex layout, and color kind against
    /// the stream, and commits them only if all three agree.
    fn admit(
        &mut self,
        buffer_type: Option<BufferType>,
        layout: Option<VertexLayout>,
        color_kind: Option<ColorKind>,
    ) -> Result<(), MeshpackError> {
        if let (Some(expected), Some(found)) = (self.buffer_type, buffer_type) {
            if expected != found {
                return Err(MeshpackError::MixedBufferType { expected, found });
            }
        }
        if let (Some(expected), Some(found)) = (self.layout, layout) {
            if expected != found {
                return Err(MeshpackError::InconsistentComponents(format!(
                    "vertex carries {:?}, stream carries {:?}",
                    found, expected
                )));
            }
        }
        let color_kind = color_kind.or(layout.and_then(|l| l.colors));
        if let (Some(expected), Some(found)) = (self.color_kind, color_kind) {
            if expected != found {
                return Err(MeshpackError::InconsistentComponents(format!(
                    "{:?} color in a stream of {:?} colors",
                    found, expected
                )));
            }
        }

        self.buffer_type = self.buffer_type.or(buffer_type);
        self.layout = self.layout.or(layout);
        self.color_kind = self.color_kind.or(color_kind);
        Ok(())
    }

    /// Fixes the buffer type for streams built from raw vertices.
    pub fn set_buffer_type(&mut self, buffer_type: BufferType) -> Result<(), MeshpackError> {
        self.admit(Some(buffer_type), None, None)
    }

    // --- Raw elements ---

    fn push_vertex(&mut self, vertex: Vertex, indices: Option<IndexKey>) {
        if vertex.mesh_push {
            self.history.push_point(PointKey {
                position: vertex.position,
                normal: vertex.normal,
                color: vertex.color,
            });
            self.history.push_indices(indices);
        }
        self.elements.push(StreamElement::Vertex(vertex));
        self.vertex_count += 1;
    }

    fn push_reference(&mut self, replace: ReplaceCode, index: usize) {
        self.elements
            .push(StreamElement::MeshReference { replace, index });
        self.mesh_reference_count += 1;
    }

    pub fn add_vertex(
        &mut self,
        position: [f32; 3],
        normal: Option<[f32; 3]>,
        color: Option<Color>,
        replace: ReplaceCode,
        mesh_push: bool,
    ) -> Result<(), MeshpackError> {
        let vertex = Vertex {
            position,
            normal,
            color,
            replace,
            mesh_push,
        };
        self.add(vertex)
    }

    pub fn add(&mut self, vertex: Vertex) -> Result<(), MeshpackError> {
        check_finite(&vertex.position, "position")?;
        if let Some(n) = vertex.normal {
            check_finite(&n, "normal")?;
        }
        if let Some(c) = vertex.color {
            let (values, count) = c.components();
            check_finite(&values[..count], "color")?;
        }
        self.admit(None, Some(vertex.layout()), None)?;
        self.push_vertex(vertex, None);
        Ok(())
    }

    /// A global color applying to all following vertices.
    pub fn add_color(&mut self, color: Color) -> Result<(), MeshpackError> {
        let (values, count) = color.components();
        check_finite(&values[..count], "color")?;
        self.admit(None, None, Some(color.kind()))?;
        self.elements.push(StreamElement::Color(color));
        Ok(())
    }

    /// A global normal applying to all following vertices.
    pub fn add_normal(&mut self, normal: [f32; 3]) -> Result<(), MeshpackError> {
        check_finite(&normal, "normal")?;
        self.elements.push(StreamElement::Normal(normal));
        Ok(())
    }

    /// Re-uses the vertex `index` pushes back from the most recent push.
    pub fn add_mesh_reference(
        &mut self,
        replace: ReplaceCode,
        index: usize,
    ) -> Result<(), MeshpackError> {
        if index >= MESH_BUFFER_SIZE || index >= self.history.addressable() {
            return Err(MeshpackError::InvalidMeshReference(index));
        }
        self.push_reference(replace, index);
        Ok(())
    }

    pub fn set_quantization(
        &mut self,
        target: QuantizationTarget,
        bits: u32,
    ) -> Result<(), MeshpackError> {
        target.validate(bits)?;
        self.elements
            .push(StreamElement::QuantizationChange { target, bits });
        Ok(())
    }

    //==============================================================================
    // 3. Primitive Helpers
    //==============================================================================

    /// Validates `arrays` and fixes the buffer type before any vertex is added.
    fn begin_primitive(
        &mut self,
        buffer_type: BufferType,
        arrays: &VertexArrays<'_>,
    ) -> Result<(), MeshpackError> {
        arrays.validate()?;
        let layout = (!arrays.is_empty()).then(|| arrays.layout());
        self.admit(Some(buffer_type), layout, None)
    }

    fn require(count: usize, ok: bool, what: &str) -> Result<(), MeshpackError> {
        if ok {
            Ok(())
        } else {
            Err(MeshpackError::InvalidInput(format!(
                "{} vertices do not form {}",
                count, what
            )))
        }
    }

    /// Each position is its own point.
    pub fn add_points(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        self.begin_primitive(BufferType::Point, &arrays)?;
        for i in 0..arrays.len() {
            self.push_vertex(arrays.vertex(i, ReplaceCode::Restart, false), None);
        }
        Ok(())
    }

    pub fn add_line_strip(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        let n = arrays.len();
        Self::require(n, n >= 2, "a line strip")?;
        self.begin_primitive(BufferType::Line, &arrays)?;
        for i in 0..n {
            let replace = if i == 0 {
                ReplaceCode::Restart
            } else {
                ReplaceCode::ReplaceOldest
            };
            self.push_vertex(arrays.vertex(i, replace, false), None);
        }
        Ok(())
    }

    /// Independent segments, one per pair of positions.
    pub fn add_lines(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        let n = arrays.len();
        Self::require(n, n % 2 == 0, "a list of line segments")?;
        self.begin_primitive(BufferType::Line, &arrays)?;
        for i in 0..n {
            let replace = if i % 2 == 0 {
                ReplaceCode::Restart
            } else {
                ReplaceCode::ReplaceOldest
            };
            self.push_vertex(arrays.vertex(i, replace, false), None);
        }
        Ok(())
    }

    pub fn add_triangle_strip(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        let n = arrays.len();
        Self::require(n, n >= 3, "a triangle strip")?;
        self.begin_primitive(BufferType::Triangle, &arrays)?;
        for i in 0..n {
            let replace = if i == 0 {
                ReplaceCode::Restart
            } else {
                ReplaceCode::ReplaceOldest
            };
            self.push_vertex(arrays.vertex(i, replace, false), None);
        }
        Ok(())
    }

    pub fn add_triangle_fan(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        let n = arrays.len();
        Self::require(n, n >= 3, "a triangle fan")?;
        self.begin_primitive(BufferType::Triangle, &arrays)?;
        for i in 0..n {
            let replace = if i == 0 {
                ReplaceCode::Restart
            } else {
                ReplaceCode::ReplaceMiddle
            };
            self.push_vertex(arrays.vertex(i, replace, false), None);
        }
        Ok(())
    }

    /// Independent triangles, one per triple of positions.
    pub fn add_triangles(&mut self, arrays: VertexArrays<'_>) -> Result<(), MeshpackError> {
        let n = arrays.len();
        Self::require(n, n % 3 == 0, "a list of triangles")?;
        self.begin_primitive(BufferType::Triangle, &arrays)?;
        for i in 0..n {
            self.push_vertex(arrays.vertex(i, triangle_code(i), false), None);
        }
        Ok(())
    }

    //==============================================================================
    // 4. Indexed Helpers
    //==============================================================================

    fn check_indices(arrays: &VertexArrays<'_>, indices: &[u32]) -> Result<(), MeshpackError> {
        match indices.iter().find(|&&i| i as usize >= arrays.len()) {
            Some(&i) => Err(MeshpackError::InvalidInput(format!(
                "index {} out of range for {} vertices",
                i,
                arrays.len()
            ))),
            None => Ok(()),
        }
    }

    /// Adds vertex `index`, replacing it with a mesh reference when the reuse
    /// policy finds it among the last 16 pushes.
    fn add_indexed_vertex(&mut self, arrays: &VertexArrays<'_>, index: u32, replace: ReplaceCode) {
        let vertex = arrays.vertex(index as usize, replace, true);
        let key = IndexKey::shared(index, arrays.normals.is_some(), arrays.colors.is_some());
        let found = match self.reuse {
            MeshReusePolicy::None => None,
            MeshReusePolicy::ByIndex => self.history.lookup_indices(key),
            MeshReusePolicy::ByValue => self.history.lookup_point(&PointKey {
                position: vertex.position,
                normal: vertex.normal,
                color: vertex.color,
            }),
        };
        match found {
            Some(offset) => self.push_reference(replace, offset),
            None => {
                let mesh_push = self.reuse != MeshReusePolicy::None;
                self.push_vertex(Vertex { mesh_push, ..vertex }, Some(key));
            }
        }
    }

    pub fn add_indexed_triangles(
        &mut self,
        arrays: VertexArrays<'_>,
        indices: &[u32],
    ) -> Result<(), MeshpackError> {
        let n = indices.len();
        Self::require(n, n % 3 == 0, "a list of indexed triangles")?;
        Self::check_indices(&arrays, indices)?;
        self.begin_primitive(BufferType::Triangle, &arrays)?;
        for (i, &index) in indices.iter().enumerate() {
            self.add_indexed_vertex(&arrays, index, triangle_code(i));
        }
        Ok(())
    }

    pub fn add_indexed_triangle_strip(
        &mut self,
        arrays: VertexArrays<'_>,
        indices: &[u32],
    ) -> Result<(), MeshpackError> {
        let n = indices.len();
        Self::require(n, n >= 3, "an indexed triangle strip")?;
        Self::check_indices(&arrays, indices)?;
        self.begin_primitive(BufferType::Triangle, &arrays)?;
        for (i, &index) in indices.iter().enumerate() {
            let replace = if i == 0 {
                ReplaceCode::Restart
            } else {
                ReplaceCode::ReplaceOldest
            };
            self.add_indexed_vertex(&arrays, index, replace);
        }
        Ok(())
    }
}

fn triangle_code(i: usize) -> ReplaceCode {
    if i % 3 == 0 {
        ReplaceCode::Restart
    } else {
        ReplaceCode::ReplaceOldest
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];

    fn replace_codes(stream: &ElementStream) -> Vec<ReplaceCode> {
        stream
            .elements()
            .iter()
            .filter_map(|e| match e {
                StreamElement::Vertex(v) => Some(v.replace),
                StreamElement::MeshReference { replace, .. } => Some(*replace),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_triangle_strip_restarts_then_replaces_oldest() {
        let mut s = ElementStream::new();
        s.add_triangle_strip(VertexArrays::new(&QUAD)).unwrap();
        use ReplaceCode::*;
        assert_eq!(
            replace_codes(&s),
            vec![Restart, ReplaceOldest, ReplaceOldest, ReplaceOldest]
        );
        assert_eq!(s.buffer_type(), Some(BufferType::Triangle));
        assert_eq!(s.vertex_count(), 4);
    }

    #[test]
    fn test_fan_and_lines_codes() {
        use ReplaceCode::*;
        let mut fan = ElementStream::new();
        fan.add_triangle_fan(VertexArrays::new(&QUAD)).unwrap();
        assert_eq!(
            replace_codes(&fan),
            vec![Restart, ReplaceMiddle, ReplaceMiddle, ReplaceMiddle]
        );

        let mut lines = ElementStream::new();
        lines.add_lines(VertexArrays::new(&QUAD)).unwrap();
        assert_eq!(
            replace_codes(&lines),
            vec![Restart, ReplaceOldest, Restart, ReplaceOldest]
        );
        assert!(lines.add_lines(VertexArrays::new(&QUAD[..3])).is_err());
    }

    #[test]
    fn test_mixed_buffer_types_rejected_without_partial_output() {
        let mut s = ElementStream::new();
        s.add_points(VertexArrays::new(&QUAD)).unwrap();
        let before = s.len();
        let err = s.add_triangle_strip(VertexArrays::new(&QUAD)).unwrap_err();
        assert!(matches!(
            err,
            MeshpackError::MixedBufferType {
                expected: BufferType::Point,
                found: BufferType::Triangle
            }
        ));
        assert_eq!(s.len(), before);
    }

    #[test]
    fn test_mixed_vertex_components_rejected() {
        let normals = [[0.0, 0.0, 1.0]; 4];
        let mut s = ElementStream::new();
        s.add_triangle_strip(VertexArrays::new(&QUAD).with_normals(&normals))
            .unwrap();
        let err = s.add_triangle_strip(VertexArrays::new(&QUAD)).unwrap_err();
        assert!(matches!(err, MeshpackError::InconsistentComponents(_)));
        assert!(s
            .add_vertex([0.0; 3], None, None, ReplaceCode::Restart, false)
            .is_err());
    }

    #[test]
    fn test_mixed_color_kinds_rejected() {
        let mut s = ElementStream::new();
        s.add_color(Color::Rgb([1.0, 0.0, 0.0])).unwrap();
        assert!(s.add_color(Color::Rgba([1.0, 0.0, 0.0, 1.0])).is_err());
        assert_eq!(s.color_kind(), Some(ColorKind::Rgb));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let bad = [[0.0, f32::NAN, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mut s = ElementStream::new();
        assert!(matches!(
            s.add_triangles(VertexArrays::new(&bad)),
            Err(MeshpackError::InvalidInput(_))
        ));
        assert!(s.is_empty());
        assert_eq!(s.buffer_type(), None);
    }

    #[test]
    fn test_mesh_reference_must_address_pushed_vertex() {
        let mut s = ElementStream::new();
        assert!(matches!(
            s.add_mesh_reference(ReplaceCode::Restart, 0),
            Err(MeshpackError::InvalidMeshReference(0))
        ));
        s.add_vertex([0.0; 3], None, None, ReplaceCode::Restart, true)
            .unwrap();
        s.add_mesh_reference(ReplaceCode::ReplaceOldest, 0).unwrap();
        assert!(s.add_mesh_reference(ReplaceCode::ReplaceOldest, 1).is_err());
        assert!(s.add_mesh_reference(ReplaceCode::ReplaceOldest, 16).is_err());
    }

    #[test]
    fn test_indexed_triangles_reuse_by_index() {
        // Two triangles sharing the edge 1-2.
        let indices = [0, 1, 2, 2, 1, 3];
        let mut s = ElementStream::with_policy(MeshReusePolicy::ByIndex);
        s.add_indexed_triangles(VertexArrays::new(&QUAD), &indices)
            .unwrap();
        assert_eq!(s.vertex_count(), 4);
        assert_eq!(s.mesh_reference_count(), 2);
        // Index 2 was the most recent push, index 1 the one before it.
        assert_eq!(
            s.elements()[3],
            StreamElement::MeshReference {
                replace: ReplaceCode::Restart,
                index: 0
            }
        );
        assert_eq!(
            s.elements()[4],
            StreamElement::MeshReference {
                replace: ReplaceCode::ReplaceOldest,
                index: 1
            }
        );
    }

    #[test]
    fn test_indexed_reuse_by_value_and_none() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let indices = [0, 1, 2, 3, 1, 2];

        let mut by_value = ElementStream::with_policy(MeshReusePolicy::ByValue);
        by_value
            .add_indexed_triangles(VertexArrays::new(&positions), &indices)
            .unwrap();
        assert_eq!(by_value.mesh_reference_count(), 3);

        let mut by_index = ElementStream::with_policy(MeshReusePolicy::ByIndex);
        by_index
            .add_indexed_triangles(VertexArrays::new(&positions), &indices)
            .unwrap();
        assert_eq!(by_index.mesh_reference_count(), 2);

        let mut none = ElementStream::with_policy(MeshReusePolicy::None);
        none.add_indexed_triangles(VertexArrays::new(&positions), &indices)
            .unwrap();
        assert_eq!(none.mesh_reference_count(), 0);
        assert_eq!(none.vertex_count(), 6);
    }

    #[test]
    fn test_indexed_out_of_range_rejected() {
        let mut s = ElementStream::new();
        assert!(s
            .add_indexed_triangle_strip(VertexArrays::new(&QUAD), &[0, 1, 4])
            .is_err());
        assert!(s.is_empty());
    }

    #[test]
    fn test_from_flat_checks_strides() {
        let flat = [0.0f32; 12];
        let arrays = VertexArrays::from_flat(&flat, Some(&flat[..]), Some((&flat[..], ColorKind::Rgba)))
            .unwrap();
        assert_eq!(arrays.len(), 4);
        assert_eq!(arrays.colors.map(|c| c.len()), Some(3));
        assert!(VertexArrays::from_flat(&flat[..11], None, None).is_err());
        assert!(VertexArrays::from_flat(&flat, None, Some((&flat[..9], ColorKind::Rgba))).is_err());
    }

    #[test]
    fn test_quantization_change_validated_at_insertion() {
        let mut s = ElementStream::new();
        assert!(s.set_quantization(QuantizationTarget::Position, 1).is_err());
        assert!(s.set_quantization(QuantizationTarget::Normal, 0).is_ok());
        assert_eq!(s.len(), 1);
    }
}
