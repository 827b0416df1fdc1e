mod async_task;
pub(crate) mod serde_base64;
pub(crate) use async_task::*;
