//! 错误类型
//!
//! 错误分为三类：
//! - 编程错误（未知 handle、重复的 depth attachment、非法的 desc）直接 panic；
//! - 帧级失败（分配失败、提交失败）通过 [`RdgError`] 向上传递；
//! - Pass 回调内的失败通过 [`RdgPassError`] 返回，执行器记录日志后继续后续 Pass。

use ash::vk;

pub type RdgResult<T> = Result<T, RdgError>;

/// 导致整帧失败的错误，调用方应当丢弃当前帧并恢复
#[derive(Debug)]
pub enum RdgError {
    /// 瞬态资源分配失败
    AllocationFailed { name: String, result: vk::Result },
    /// queue submit 失败
    SubmitFailed { result: vk::Result },
}

impl std::fmt::Display for RdgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RdgError::AllocationFailed { name, result } => {
                write!(f, "failed to allocate transient resource '{}': {:?}", name, result)
            }
            RdgError::SubmitFailed { result } => write!(f, "queue submit failed: {:?}", result),
        }
    }
}

impl std::error::Error for RdgError {}

pub type RdgPassResult = Result<(), RdgPassError>;

/// Pass 回调内部的失败
///
/// 不会波及整帧：执行器记录日志，跳过该 Pass 剩余部分，继续执行后续 Pass
#[derive(Debug)]
pub struct RdgPassError {
    message: String,
}

impl RdgPassError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RdgPassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RdgPassError {}

impl From<&str> for RdgPassError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RdgPassError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
