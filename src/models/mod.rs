pub mod batch;
pub mod dispatch;
pub mod document;
