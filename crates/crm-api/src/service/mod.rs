//! 业务服务层

pub mod segment;

pub use segment::SegmentService;
