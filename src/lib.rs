pub mod config;
pub mod detect;
pub mod messages;
pub mod overlay;
pub mod report;
pub mod session;
pub mod status;
pub mod surface;
#[doc(hidden)]
pub mod test_support;
