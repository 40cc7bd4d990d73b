//! Face-mesh landmarks and the lip subset taken from them.

use std::ops::RangeInclusive;

use lipread_camera::Frame;

use crate::Result;

/// Face-mesh indices that outline the lips.
pub const LIP_LANDMARKS: RangeInclusive<usize> = 61..=90;

/// One face-mesh point, normalised to `[0, 1]` of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A face-mesh model: every face in the frame, each as its full mesh.
pub trait FaceMesh: Send {
    fn faces(&mut self, frame: &Frame) -> Result<Vec<Vec<Landmark>>>;
}

/// Lip outline of a frame in pixel coordinates, `None` when no face.
pub trait LipDetector: Send {
    fn extract_lips(&mut self, frame: &Frame) -> Result<Option<Vec<(i32, i32)>>>;
}

/// Lip points of every face, converted to pixels (truncating).
///
/// Returns `None` when there is no face at all.
pub fn lip_points(faces: &[Vec<Landmark>], width: u32, height: u32) -> Option<Vec<(i32, i32)>> {
    if faces.is_empty() {
        return None;
    }
    let (w, h) = (width as f32, height as f32);
    Some(
        faces
            .iter()
            .flat_map(|mesh| {
                mesh.iter()
                    .enumerate()
                    .filter(|(i, _)| LIP_LANDMARKS.contains(i))
                    .map(move |(_, p)| ((p.x * w) as i32, (p.y * h) as i32))
            })
            .collect(),
    )
}

/// [`LipDetector`] on top of any [`FaceMesh`].
pub struct MeshLipDetector<M> {
    mesh: M,
}

impl<M: FaceMesh> MeshLipDetector<M> {
    pub fn new(mesh: M) -> Self {
        Self { mesh }
    }
}

impl<M: FaceMesh> LipDetector for MeshLipDetector<M> {
    fn extract_lips(&mut self, frame: &Frame) -> Result<Option<Vec<(i32, i32)>>> {
        let faces = self.mesh.faces(frame)?;
        Ok(lip_points(&faces, frame.width(), frame.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn mesh(points: usize) -> Vec<Landmark> {
        (0..points)
            .map(|i| Landmark::new(i as f32 / 100.0, 0.5))
            .collect()
    }

    #[test]
    fn keeps_only_lip_indices() {
        let pts = lip_points(&[mesh(468)], 100, 200).unwrap();
        assert_eq!(pts.len(), 30);
        assert_eq!(pts.first(), Some(&(61, 100)));
        assert_eq!(pts.last(), Some(&(90, 100)));
    }

    #[test]
    fn no_face_means_no_points() {
        assert_eq!(lip_points(&[], 640, 480), None);
    }

    #[test]
    fn truncates_to_pixels() {
        let mut face = vec![Landmark::new(0.0, 0.0); 61];
        face.push(Landmark::new(0.999, 0.5049));
        assert_eq!(lip_points(&[face], 10, 100).unwrap(), vec![(9, 50)]);
    }

    #[test]
    fn multiple_faces_are_concatenated() {
        let pts = lip_points(&[mesh(91), mesh(91)], 100, 100).unwrap();
        assert_eq!(pts.len(), 60);
    }

    struct FixedMesh(Vec<Vec<Landmark>>);

    impl FaceMesh for FixedMesh {
        fn faces(&mut self, _: &Frame) -> Result<Vec<Vec<Landmark>>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn mesh_detector_scales_by_frame_size() {
        let mut det = MeshLipDetector::new(FixedMesh(vec![mesh(100)]));
        let frame = Frame::new(0, RgbImage::new(200, 10));
        let lips = det.extract_lips(&frame).unwrap().unwrap();
        assert_eq!(lips[0], (122, 5));

        let mut empty = MeshLipDetector::new(FixedMesh(Vec::new()));
        assert!(empty.extract_lips(&frame).unwrap().is_none());
    }
}
