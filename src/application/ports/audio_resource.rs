//! Audio Resource - 可撤销的音频资源句柄
//!
//! 缓存与播放共享同一份音频数据；撤销后所有克隆的句柄都会看到失效状态

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
struct ResourceInner {
    id: Uuid,
    data: Arc<[u8]>,
    mime_type: String,
    revoked: AtomicBool,
}

/// 音频资源句柄
///
/// `Clone` 共享同一个句柄。缓存淘汰/清空时会调用 `revoke()`，
/// 正在播放的会话可以继续使用已加载的数据，但新的播放不得再使用它
#[derive(Debug, Clone)]
pub struct AudioResource {
    inner: Arc<ResourceInner>,
}

impl AudioResource {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                id: Uuid::new_v4(),
                data: data.into(),
                mime_type: mime_type.into(),
                revoked: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    /// 共享的音频数据（播放元素持有，撤销后仍然有效）
    pub fn shared_data(&self) -> Arc<[u8]> {
        self.inner.data.clone()
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.data.len() as u64
    }

    /// 撤销句柄，返回撤销前是否有效
    pub fn revoke(&self) -> bool {
        !self.inner.revoked.swap(true, Ordering::AcqRel)
    }

    pub fn is_revoked(&self) -> bool {
        self.inner.revoked.load(Ordering::Acquire)
    }
}
