//! Handle types for the body arena

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generation-checked handle to a body stored in a `PhysicsWorld`.
    ///
    /// A handle whose body was destroyed never resolves again, even if the
    /// slot is reused.
    pub struct BodyHandle;
}

/// Arena of bodies addressed by [`BodyHandle`]
pub type BodyArena<T> = SlotMap<BodyHandle, T>;
