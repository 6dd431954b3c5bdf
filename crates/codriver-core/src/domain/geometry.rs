//! Spatial types and pointer-path planning.
//!
//! Pure logic with no OS or network dependencies. Positions always carry a
//! [`CoordinateSpace`] tag because the agent reports values in either world
//! or screen coordinates depending on the conversion requested; comparing
//! two positions from different spaces is meaningless, so consumers must
//! check the tag first.

use serde::{Deserialize, Serialize};

// ── Coordinate spaces and conversions ─────────────────────────────────────────

/// The coordinate space a [`Position`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoordinateSpace {
    /// Scene/world units, origin and axes defined by the automated app.
    World = 0x01,
    /// Pixels, origin at the top-left of the application window.
    Screen = 0x02,
    /// The agent did not state a space (e.g. raw field reads).
    Unspecified = 0x03,
}

impl TryFrom<u8> for CoordinateSpace {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CoordinateSpace::World),
            0x02 => Ok(CoordinateSpace::Screen),
            0x03 => Ok(CoordinateSpace::Unspecified),
            _ => Err(()),
        }
    }
}

/// Conversion the agent applies to an object position before replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoordinateConversion {
    /// Report the position as stored, tagged [`CoordinateSpace::World`].
    None = 0x01,
    /// Project the world position into window pixels, tagged
    /// [`CoordinateSpace::Screen`].
    WorldToScreen = 0x02,
}

impl TryFrom<u8> for CoordinateConversion {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CoordinateConversion::None),
            0x02 => Ok(CoordinateConversion::WorldToScreen),
            _ => Err(()),
        }
    }
}

// ── Position ──────────────────────────────────────────────────────────────────

/// A 3-component spatial value with its coordinate-space tag.
///
/// Screen-space positions use `x`/`y` as window pixels and carry `z` as the
/// depth the projection produced (0.0 when irrelevant).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub space: CoordinateSpace,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32, space: CoordinateSpace) -> Self {
        Self { x, y, z, space }
    }

    /// A screen-space position at the given pixel coordinates.
    pub fn screen(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, CoordinateSpace::Screen)
    }

    /// A world-space position.
    pub fn world(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, CoordinateSpace::World)
    }

    /// Returns `true` if both positions carry the same space tag.
    ///
    /// Distances between positions from different spaces are meaningless;
    /// callers check this before [`Position::distance_2d`].
    pub fn same_space(&self, other: &Position) -> bool {
        self.space == other.space
    }

    /// Planar distance, ignoring `z`.
    pub fn distance_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Color ─────────────────────────────────────────────────────────────────────

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

// ── Pointer path planning ─────────────────────────────────────────────────────

/// Plans a linearly interpolated pointer path from `origin` to `dest`.
///
/// Returns exactly `steps` waypoints; the final waypoint is `dest` itself so
/// the pointer always lands precisely on the target regardless of rounding.
/// `steps == 0` collapses to a single teleport waypoint at `dest`.
pub fn pointer_path(origin: (f32, f32), dest: (f32, f32), steps: u32) -> Vec<(f32, f32)> {
    if steps == 0 {
        return vec![dest];
    }
    let mut path = Vec::with_capacity(steps as usize);
    for i in 1..=steps {
        let t = i as f32 / steps as f32;
        path.push((
            origin.0 + (dest.0 - origin.0) * t,
            origin.1 + (dest.1 - origin.1) * t,
        ));
    }
    // Clamp the last waypoint to the exact destination.
    if let Some(last) = path.last_mut() {
        *last = dest;
    }
    path
}

// ── Tests ─────────────────────────────────────────────────────────────────────
