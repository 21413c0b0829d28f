//! Body transform write-back buffer.
//!
//! After every step the world copies body positions into a flat array of
//! plain-old-data records so a renderer or a network layer can take the
//! bytes without walking the bodies.

use crate::body::Body;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BodyTransform {
    pub position: [f32; 3],
    /// Raw [`crate::BodyId`] index.
    pub body: u32,
}

#[derive(Debug, Default)]
pub struct TransformBuffer {
    records: Vec<BodyTransform>,
}

impl TransformBuffer {
    pub(crate) fn fill<'a>(&mut self, bodies: impl Iterator<Item = &'a Body>) {
        self.records.clear();
        self.records.extend(bodies.map(|body| BodyTransform {
            position: body.position.to_array(),
            body: body.id().0,
        }));
    }

    #[must_use]
    pub fn records(&self) -> &[BodyTransform] {
        &self.records
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::types::{BodyId, Vec3};

    #[test]
    fn records_are_sixteen_bytes() {
        let bodies = [
            BodyDesc::sphere(1.0).at(Vec3::new(1.0, 2.0, 3.0)).build(BodyId(7)),
            BodyDesc::sphere(1.0).build(BodyId(9)),
        ];
        let mut buffer = TransformBuffer::default();
        buffer.fill(bodies.iter());

        assert_eq!(buffer.as_bytes().len(), 32);
        let records: &[BodyTransform] = bytemuck::cast_slice(buffer.as_bytes());
        assert_eq!(records[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(records[1].body, 9);
    }
}
