//! Playback Registry - 全局播放注册表
//!
//! 记录当前所有播放元素，保证系统内同一时刻最多只有一个声音：
//! 注册新元素前必须先 `stop_all()`，它同时会停止平台语音朗读

use dashmap::DashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use super::sync_loop::SyncLoop;
use crate::application::ports::{FallbackNarrator, PlaybackElement};

/// 已注册的播放元素及其绑定的同步循环
struct Registration {
    element: Arc<dyn PlaybackElement>,
    sync: Option<SyncLoop>,
}

/// 播放注册表
///
/// 进程内共享，由引擎显式创建并通过 `Arc` 传递
pub struct PlaybackRegistry {
    entries: DashMap<Uuid, Registration>,
    narrator: RwLock<Option<Arc<dyn FallbackNarrator>>>,
    /// 串行化 stop_all + register，多线程运行时下也只会留下一个元素
    exclusive: Mutex<()>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            narrator: RwLock::new(None),
            exclusive: Mutex::new(()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 设置平台语音朗读器
    pub fn set_narrator(&self, narrator: Arc<dyn FallbackNarrator>) {
        *self.narrator.write().unwrap_or_else(|e| e.into_inner()) = Some(narrator);
    }

    /// 注册播放元素
    pub fn register(&self, element: Arc<dyn PlaybackElement>) {
        let id = element.id();
        self.entries.insert(id, Registration { element, sync: None });
        tracing::debug!(element_id = %id, "Playback element registered");
    }

    /// 停止所有声音后注册新元素（保证 stop_all 先于 register）
    pub fn register_exclusive(&self, element: Arc<dyn PlaybackElement>) {
        let _guard = self.exclusive.lock().unwrap_or_else(|e| e.into_inner());
        self.stop_all();
        self.register(element);
    }

    /// 将同步循环绑定到播放元素，注销时一并取消
    ///
    /// 元素已注销时立即取消循环
    pub fn bind_sync_loop(&self, element_id: Uuid, sync: SyncLoop) {
        match self.entries.get_mut(&element_id) {
            Some(mut registration) => registration.sync = Some(sync),
            None => sync.cancel(),
        }
    }

    /// 注销播放元素并释放绑定的同步循环
    pub fn unregister(&self, element_id: Uuid) -> bool {
        match self.entries.remove(&element_id) {
            Some((_, registration)) => {
                if let Some(sync) = registration.sync {
                    sync.finish();
                }
                tracing::debug!(element_id = %element_id, "Playback element unregistered");
                true
            }
            None => false,
        }
    }

    /// 停止所有声音，返回停止的播放元素数量
    ///
    /// 无播放时调用也是安全的
    pub fn stop_all(&self) -> usize {
        // 先收集再移除，避免在迭代 DashMap 时回调
        let ids: Vec<Uuid> = self.entries.iter().map(|e| *e.key()).collect();
        let mut stopped = 0;
        for id in ids {
            if let Some((_, registration)) = self.entries.remove(&id) {
                if let Some(sync) = registration.sync {
                    sync.finish();
                }
                registration.element.pause();
                stopped += 1;
            }
        }

        let narrator = self
            .narrator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(narrator) = narrator {
            if narrator.is_speaking() {
                narrator.cancel();
                tracing::debug!("Fallback narration cancelled");
            }
        }

        if stopped > 0 {
            tracing::debug!(stopped = stopped, "Stopped all playback");
        }
        stopped
    }

    /// 正在播放的元素数量
    pub fn playing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().element.is_active())
            .count()
    }

    pub fn is_registered(&self, element_id: Uuid) -> bool {
        self.entries.contains_key(&element_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 测试隔离：停止并清空所有状态（保留朗读器设置）
    pub fn reset(&self) {
        self.stop_all();
    }
}

impl Default for PlaybackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
