//! Scene collaborators used by the animation scheduler.
//!
//! - [`Transform`]: TRS component with shadow-state dirty checking
//! - [`TransformChanges`]: change notification recorder with scoped,
//!   nestable suspension so a whole animation pass is delivered as one batch

pub mod changes;
pub mod transform;

pub use changes::{SuspendGuard, TransformChanges};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
}
