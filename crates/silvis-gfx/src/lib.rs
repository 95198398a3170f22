//! Silvis 的 Vulkan 基础层
//!
//! 对 ash 的薄封装：instance/device 创建与 feature 协商、VMA 内存分配、
//! command pool 管理、同步原语、swapchain 以及 image/buffer 资源。
//! 上层的 render graph（silvis-rdg）只依赖这一层提供的能力。

pub mod basic;
pub mod commands;
pub mod foundation;
pub mod init_log;
pub mod resources;
pub mod swapchain;

pub use init_log::init_log;
