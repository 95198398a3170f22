//! Silvis 的 Render Dependency Graph
//!
//! 每帧声明式地描述渲染工作：声明资源、录制 Pass 的读写依赖，
//! 由编译器完成 Pass 剔除、生命周期分析、瞬态资源复用和 barrier 合成，
//! 最后由执行器录制并提交一次 command buffer。
//!
//! 使用流程：
//! 1. 创建 builder：`RdgBuilder::new(...)`
//! 2. 声明资源：`create_transient_texture` / `import_external_texture` / `import_swapchain_image`
//! 3. 添加 Pass：`add_pass("name", callback).read_texture(...).write_color_attachment(...)`
//! 4. 提交：`builder.execute(Some(sync_bundle))`
//!
//! builder 是单帧对象，每帧重新构建；跨帧存活的只有
//! [`RdgTransientPool`]（瞬态资源复用池）和 [`RdgFrameSyncManager`]（帧同步）。

mod accessor;
mod barrier;
mod compile;
mod error;
mod executor;
mod graph;
mod handle;
mod pass;
mod pool;
mod registry;
mod resource;
mod sampler;
mod sync;

pub use accessor::RdgResourceAccessor;
pub use error::{RdgError, RdgPassError, RdgPassResult, RdgResult};
pub use graph::RdgBuilder;
pub use handle::{RdgBufferHandle, RdgTextureHandle};
pub use pass::{RdgColorAttachment, RdgDepthStencilAttachment, RdgPassKind, RdgPassRef};
pub use pool::RdgTransientPool;
pub use resource::{RdgBufferDesc, RdgTextureDesc};
pub use sampler::RdgSamplerKind;
pub use sync::{RdgFrameSyncManager, RdgSyncBundle};
