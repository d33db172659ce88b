pub mod ensure;
pub mod lookup;
pub mod pull_secret;
