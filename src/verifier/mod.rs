//! Verification-time model of values: the types the bytecode verifier tracks and the frames
//! (locals plus operand stack) recorded at branch targets. These are what ultimately get
//! serialized into the `StackMapTable` attribute.

mod frame;
mod types;

pub use frame::Frame;
pub use types::VerificationType;
