pub mod bridge;
pub mod peer;
pub mod registry;
pub mod synthesis;
