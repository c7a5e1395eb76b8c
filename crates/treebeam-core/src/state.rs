//! Capability contract for pluggable problem states.

/// What a problem type must supply to be searchable.
///
/// The engine never inspects the state beyond cloning it, comparing it for
/// equality (the transposition collision predicate) and hashing it into the
/// depth-scoped transposition table. Scoring stays entirely on the caller's
/// side: children are reported together with an `f64` desirability value,
/// higher is better. By convention a very large negative score marks a dead
/// or rejected state; the engine does not enforce that.
pub trait SearchState: Clone + PartialEq {
    /// 64-bit hash of the state, used as the transposition-table key.
    ///
    /// States that compare equal must return the same key. Unequal states may
    /// collide; collisions are resolved with the equality predicate.
    fn state_key(&self) -> u64;
}
