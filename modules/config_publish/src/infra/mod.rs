//! Infrastructure layer - storage and external integrations

pub mod storage;
