//! Latest pairing challenge per tenant, plus its out-of-band artifact.

pub mod render;
pub mod store;

pub use render::{ChallengeRenderer, NullRenderer, QrSvgRenderer, RenderOutcome};
pub use store::{PairingChallenge, PairingStore};
