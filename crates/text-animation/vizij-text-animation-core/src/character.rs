//! Per-character records consumed from the host text system.
//!
//! The host owns glyph geometry; the core only reads `index`/`is_visible` and
//! writes the current mesh. Animations compose on top of `source`, which the
//! scheduler copies into `mesh` before the first animation of each tick.

use serde::{Deserialize, Serialize};

/// Quad vertices (bottom-left, top-left, top-right, bottom-right) and their colors.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshState {
    pub positions: [[f32; 2]; 4],
    pub colors: [[f32; 4]; 4],
}

impl Default for MeshState {
    fn default() -> Self {
        Self::quad([0.0, 0.0], [1.0, 1.0])
    }
}

impl MeshState {
    /// Axis-aligned white quad.
    pub fn quad(min: [f32; 2], max: [f32; 2]) -> Self {
        Self {
            positions: [[min[0], min[1]], [min[0], max[1]], [max[0], max[1]], [max[0], min[1]]],
            colors: [[1.0, 1.0, 1.0, 1.0]; 4],
        }
    }

    pub fn center(&self) -> [f32; 2] {
        let mut c = [0.0f32; 2];
        for p in &self.positions {
            c[0] += p[0] * 0.25;
            c[1] += p[1] * 0.25;
        }
        c
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for p in &mut self.positions {
            p[0] += dx;
            p[1] += dy;
        }
    }

    pub fn scale_about_center(&mut self, factor: f32) {
        let c = self.center();
        for p in &mut self.positions {
            p[0] = c[0] + (p[0] - c[0]) * factor;
            p[1] = c[1] + (p[1] - c[1]) * factor;
        }
    }

    pub fn multiply_alpha(&mut self, alpha: f32) {
        for c in &mut self.colors {
            c[3] *= alpha;
        }
    }

    pub fn alpha(&self) -> f32 {
        self.colors[0][3]
    }

    /// State of a hidden character: collapsed onto its center, fully transparent.
    pub fn cleared(&self) -> Self {
        let c = self.center();
        let mut colors = self.colors;
        for color in &mut colors {
            color[3] = 0.0;
        }
        Self {
            positions: [c; 4],
            colors,
        }
    }
}

/// One character of the laid-out text.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterRecord {
    pub index: usize,
    pub character: char,
    /// Whether the character has a renderable glyph (whitespace does not).
    pub is_visible: bool,
    /// Visible initial mesh provided by the host layout.
    pub source: MeshState,
    /// Current mesh written by the animator.
    pub mesh: MeshState,
}

impl CharacterRecord {
    pub fn new(index: usize, character: char, source: MeshState) -> Self {
        Self {
            index,
            character,
            is_visible: !character.is_whitespace(),
            source,
            mesh: source.cleared(),
        }
    }

    /// Lay `text` out on a single line of unit-sized quads. Useful for tests and
    /// headless hosts that do not care about real glyph metrics.
    pub fn from_text(text: &str) -> Vec<Self> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let x = i as f32;
                CharacterRecord::new(i, ch, MeshState::quad([x, 0.0], [x + 1.0, 1.0]))
            })
            .collect()
    }

    #[inline]
    pub fn reset_to_source(&mut self) {
        self.mesh = self.source;
    }

    #[inline]
    pub fn reset_to_cleared(&mut self) {
        self.mesh = self.source.cleared();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_not_visible() {
        let chars = CharacterRecord::from_text("a b");
        assert!(chars[0].is_visible);
        assert!(!chars[1].is_visible);
        assert_eq!(chars[2].index, 2);
        assert_eq!(chars[2].source.center(), [2.5, 0.5]);
    }

    #[test]
    fn cleared_differs_from_source() {
        let mut ch = CharacterRecord::from_text("x").remove(0);
        assert_eq!(ch.mesh.alpha(), 0.0);
        ch.reset_to_source();
        assert_eq!(ch.mesh, ch.source);
        ch.mesh.translate(0.0, 2.0);
        ch.mesh.scale_about_center(2.0);
        assert_eq!(ch.mesh.center(), [0.5, 2.5]);
        ch.reset_to_cleared();
        assert_ne!(ch.mesh, ch.source);
        assert_eq!(ch.mesh.positions[0], ch.mesh.positions[2]);
    }
}
