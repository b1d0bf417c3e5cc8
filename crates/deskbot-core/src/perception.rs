//! Perception boundary.
//!
//! Camera capture, face detection and emotion classification live outside
//! this crate; the runtime only needs per-frame answers to three
//! questions, asked through [`Perception`].

use std::collections::VecDeque;

use deskbot_body::Emotion;

/// A detected face in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub frame_width: f64,
}

impl FaceBox {
    /// Horizontal offset of the face center from the frame center,
    /// normalized to [-0.5, 0.5]. Negative is left of center.
    pub fn displacement(&self) -> f64 {
        let face_center = self.x + self.width / 2.0;
        (face_center - self.frame_width / 2.0) / self.frame_width
    }

    pub fn is_centered(&self, tolerance: f64) -> bool {
        self.displacement().abs() <= tolerance
    }
}

/// Per-frame perception queries, answered by whatever vision stack is
/// plugged in.
pub trait Perception: Send {
    /// Advance to the next camera frame. `false` means no frame was
    /// available right now; the caller should back off and retry.
    fn next_frame(&mut self) -> bool;

    /// The dominant face on the current frame, if any.
    fn detect_face(&mut self) -> Option<FaceBox>;

    /// Expression classification for the current frame. Labels without a
    /// gesture (neutral, disgust) come back as `None`.
    fn detect_emotion(&mut self) -> Option<(Emotion, f64)>;
}

/// One pre-scripted perception frame.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFrame {
    pub face: Option<FaceBox>,
    pub emotion: Option<(Emotion, f64)>,
}

impl ScriptedFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A face at the given normalized displacement from center.
    pub fn face_at(displacement: f64) -> Self {
        let frame_width = 640.0;
        let width = 100.0;
        Self {
            face: Some(FaceBox {
                x: frame_width / 2.0 + displacement * frame_width - width / 2.0,
                y: 100.0,
                width,
                height: 100.0,
                frame_width,
            }),
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, emotion: Emotion, confidence: f64) -> Self {
        self.emotion = Some((emotion, confidence));
        self
    }
}

/// Canned perception for tests and bench-top simulation.
///
/// Plays its script in order; once exhausted every further frame is empty
/// (camera up, nobody there).
pub struct ScriptedPerception {
    script: VecDeque<ScriptedFrame>,
    current: ScriptedFrame,
}

impl ScriptedPerception {
    pub fn new(script: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            script: script.into_iter().collect(),
            current: ScriptedFrame::empty(),
        }
    }
}

impl Perception for ScriptedPerception {
    fn next_frame(&mut self) -> bool {
        self.current = self.script.pop_front().unwrap_or_default();
        true
    }

    fn detect_face(&mut self) -> Option<FaceBox> {
        self.current.face
    }

    fn detect_emotion(&mut self) -> Option<(Emotion, f64)> {
        self.current.emotion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_is_signed_and_normalized() {
        let centered = ScriptedFrame::face_at(0.0).face.unwrap();
        assert!(centered.displacement().abs() < 1e-9);
        assert!(centered.is_centered(0.05));

        let left = ScriptedFrame::face_at(-0.25).face.unwrap();
        assert!((left.displacement() + 0.25).abs() < 1e-9);
        assert!(!left.is_centered(0.05));
    }

    #[test]
    fn script_plays_in_order_then_goes_empty() {
        let mut p = ScriptedPerception::new([
            ScriptedFrame::face_at(0.0).with_emotion(Emotion::Happy, 0.9),
            ScriptedFrame::empty(),
        ]);
        assert!(p.next_frame());
        assert!(p.detect_face().is_some());
        assert_eq!(p.detect_emotion(), Some((Emotion::Happy, 0.9)));

        assert!(p.next_frame());
        assert!(p.detect_face().is_none());

        assert!(p.next_frame());
        assert!(p.detect_face().is_none());
        assert!(p.detect_emotion().is_none());
    }
}
