//! Collision layer system for filtering collision detection
//!
//! Based on Game Engine Architecture 3rd Edition, Section 13.3.8:
//! "Most games need to filter collisions... This is typically done via
//! collision layers or groups."
//!
//! Every collider belongs to one [`Layer`]. A symmetric `LAYER_MAX x LAYER_MAX`
//! bit matrix decides which layer pairs are tested at all; the broad phase
//! only iterates enabled combinations.

use serde::{Deserialize, Serialize};

/// Number of distinct layers
pub const LAYER_MAX: usize = 32;

/// Index of a collision layer (`0..LAYER_MAX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Layer(u8);

impl Layer {
    /// Layer used when none is requested
    pub const DEFAULT: Self = Self(0);

    // Standard game entity layers (1-8)
    /// Player character layer
    pub const PLAYER: Self = Self(1);

    /// Enemy character layer
    pub const ENEMY: Self = Self(2);

    /// Projectiles (bullets, missiles, etc.)
    pub const PROJECTILE: Self = Self(3);

    /// Static environment geometry
    pub const ENVIRONMENT: Self = Self(4);

    /// Trigger volumes
    pub const TRIGGER: Self = Self(5);

    /// Debris and small physics objects
    pub const DEBRIS: Self = Self(6);

    /// Vehicles
    pub const VEHICLE: Self = Self(7);

    /// Pickups and collectibles
    pub const PICKUP: Self = Self(8);

    /// Layer with the given index; `None` when `index >= LAYER_MAX`
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < LAYER_MAX {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Index of this layer
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Single-bit mask for this layer
    pub const fn bit(self) -> u32 {
        1 << self.0
    }

    /// Iterate every valid layer in index order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..LAYER_MAX as u8).map(Self)
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Symmetric layer-pair collision matrix
///
/// Row `i` holds one bit per layer `j`; `rows[i] >> j & 1 == rows[j] >> i & 1`
/// always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionLayers {
    rows: [u32; LAYER_MAX],
}

impl Default for CollisionLayers {
    /// Every layer collides with itself and nothing else
    fn default() -> Self {
        let mut rows = [0; LAYER_MAX];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = 1 << i;
        }
        Self { rows }
    }
}

impl CollisionLayers {
    /// No collision layer
    pub const NONE: u32 = 0;

    /// All collision layers
    pub const ALL: u32 = 0xFFFF_FFFF;

    /// Matrix with every pair disabled
    pub fn none() -> Self {
        Self { rows: [Self::NONE; LAYER_MAX] }
    }

    /// Matrix with every pair enabled
    pub fn all() -> Self {
        Self { rows: [Self::ALL; LAYER_MAX] }
    }

    /// Enable or disable collisions between `a` and `b` (both directions)
    ///
    /// Returns true when the matrix changed.
    pub fn set(&mut self, a: Layer, b: Layer, enabled: bool) -> bool {
        if self.should_collide(a, b) == enabled {
            return false;
        }
        if enabled {
            self.rows[a.index()] |= b.bit();
            self.rows[b.index()] |= a.bit();
        } else {
            self.rows[a.index()] &= !b.bit();
            self.rows[b.index()] &= !a.bit();
        }
        true
    }

    /// Check if two layers should collide
    pub fn should_collide(&self, a: Layer, b: Layer) -> bool {
        self.rows[a.index()] & b.bit() != 0
    }

    /// Bit mask of the layers `layer` collides with
    pub fn row(&self, layer: Layer) -> u32 {
        self.rows[layer.index()]
    }

    /// Enabled unordered layer pairs `(a, b)` with `a <= b`
    pub fn enabled_pairs(&self) -> Vec<(Layer, Layer)> {
        let mut pairs = Vec::new();
        for a in Layer::all() {
            let row = self.rows[a.index()];
            if row == 0 {
                continue;
            }
            for b in Layer::all().skip(a.index()) {
                if row & b.bit() != 0 {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// Helper to create a mask from multiple layers
    ///
    /// # Example
    /// ```
    /// use rust_physics::physics::collision_layers::{CollisionLayers, Layer};
    ///
    /// let mask = CollisionLayers::mask(&[Layer::PLAYER, Layer::ENEMY, Layer::ENVIRONMENT]);
    /// assert_eq!(mask, Layer::PLAYER.bit() | Layer::ENEMY.bit() | Layer::ENVIRONMENT.bit());
    /// ```
    pub fn mask(layers: &[Layer]) -> u32 {
        layers.iter().fold(0, |acc, layer| acc | layer.bit())
    }
}
