//! Component models shipped with the runtime

pub mod fake;

pub use fake::{register_fake_models, FakeComponent, FAKE_MODEL};
