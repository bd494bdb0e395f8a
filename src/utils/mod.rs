pub mod paths;
pub mod vcs;
