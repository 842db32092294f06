pub mod error;
pub mod feed;
pub mod k8s;
pub mod tui;
