pub mod delta;
pub mod entity;
pub mod envelope;

pub use delta::{decode_delta, DeltaUpdate};
pub use entity::{decode_entity, Entity};
pub use envelope::{decode_envelope, DecodedEnvelope, Envelope};
