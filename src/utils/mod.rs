pub mod debounce;
pub mod errors;
pub mod semver;
pub mod validation;
