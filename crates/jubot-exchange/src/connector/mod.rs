//! 업스트림 시세 API 커넥터.

pub mod kis;
