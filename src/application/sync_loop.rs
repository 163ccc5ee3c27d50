//! Sync Loop - 播放时钟到单词下标的同步循环
//!
//! 每个渲染帧（默认约 16ms）读取一次播放时钟，二分查找当前单词，
//! 只有下标变化时才回调高亮消费者。回调在调度锁内执行，
//! `cancel()` 返回后保证不会再有回调

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::PlaybackElement;
use crate::domain::Boundaries;

/// 高亮回调：`None` 表示无高亮单词，`Some(i)` 表示第 i 个单词正在朗读
pub type HighlightSink = Box<dyn FnMut(Option<usize>) + Send + 'static>;

/// 可在播放中替换的边界（时长就绪后重算）
pub type SharedBoundaries = Arc<RwLock<Boundaries>>;

/// 同步循环读取的播放时钟
pub trait PlaybackClock: Send + Sync {
    /// 是否处于播放中（暂停/结束时循环停止）
    fn is_playing(&self) -> bool;

    /// 当前播放位置（秒）
    fn position(&self) -> f64;
}

impl PlaybackClock for Arc<dyn PlaybackElement> {
    fn is_playing(&self) -> bool {
        self.is_active()
    }

    fn position(&self) -> f64 {
        self.current_time()
    }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 继续调度下一帧
    Continue,
    /// 播放已停止或循环已取消
    Stop,
}

struct Dispatch {
    sink: HighlightSink,
    last_index: Option<usize>,
}

struct SyncShared {
    boundaries: SharedBoundaries,
    cancelled: AtomicBool,
    dispatch: Mutex<Dispatch>,
    /// 正在执行回调的线程，用于识别回调内部的重入取消
    dispatch_owner: Mutex<Option<ThreadId>>,
    ticks: AtomicU64,
    callbacks: AtomicU64,
}

impl SyncShared {
    fn lock_dispatch(&self) -> std::sync::MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_owner(&self, owner: Option<ThreadId>) {
        *self.dispatch_owner.lock().unwrap_or_else(|e| e.into_inner()) = owner;
    }

    fn is_reentrant(&self) -> bool {
        *self.dispatch_owner.lock().unwrap_or_else(|e| e.into_inner())
            == Some(thread::current().id())
    }

    /// 下标变化时回调，返回是否发生了回调
    fn deliver(&self, index: Option<usize>) -> bool {
        let mut dispatch = self.lock_dispatch();
        if self.cancelled.load(Ordering::Acquire) || dispatch.last_index == index {
            return false;
        }
        dispatch.last_index = index;

        self.set_owner(Some(thread::current().id()));
        (dispatch.sink)(index);
        self.set_owner(None);
        self.callbacks.fetch_add(1, Ordering::Relaxed);

        // 回调内部取消了循环
        if self.cancelled.load(Ordering::Acquire) {
            dispatch.last_index = None;
        }
        true
    }
}

/// 同步循环句柄
///
/// `Clone` 共享同一个循环；任何克隆调用 `cancel()` 都会停止循环
#[derive(Clone)]
pub struct SyncLoop {
    shared: Arc<SyncShared>,
    token: CancellationToken,
}

impl std::fmt::Debug for SyncLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLoop")
            .field("cancelled", &self.is_cancelled())
            .field("last_index", &self.last_index())
            .finish()
    }
}

impl SyncLoop {
    /// 创建未调度的循环（由宿主渲染循环手动调用 `tick`）
    pub fn new(boundaries: SharedBoundaries, sink: HighlightSink) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                boundaries,
                cancelled: AtomicBool::new(false),
                dispatch: Mutex::new(Dispatch {
                    sink,
                    last_index: None,
                }),
                dispatch_owner: Mutex::new(None),
                ticks: AtomicU64::new(0),
                callbacks: AtomicU64::new(0),
            }),
            token: CancellationToken::new(),
        }
    }

    /// 创建并在 tokio 运行时上按固定帧间隔调度
    pub fn start<C>(
        clock: C,
        boundaries: SharedBoundaries,
        sink: HighlightSink,
        frame_interval: Duration,
    ) -> Self
    where
        C: PlaybackClock + 'static,
    {
        let sync = Self::new(boundaries, sink);
        sync.spawn(clock, frame_interval);
        sync
    }

    /// 在 tokio 运行时上调度 tick，直到播放停止或循环取消
    pub fn spawn<C>(&self, clock: C, frame_interval: Duration) -> JoinHandle<()>
    where
        C: PlaybackClock + 'static,
    {
        let sync = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = sync.token.cancelled() => break,
                    _ = ticker.tick() => {
                        if sync.tick(&clock) == TickOutcome::Stop {
                            break;
                        }
                    }
                }
            }

            tracing::trace!(ticks = sync.tick_count(), "Sync loop stopped");
        })
    }

    /// 执行一帧
    pub fn tick(&self, clock: &dyn PlaybackClock) -> TickOutcome {
        if self.is_cancelled() || !clock.is_playing() {
            return TickOutcome::Stop;
        }
        self.shared.ticks.fetch_add(1, Ordering::Relaxed);

        let t = clock.position();
        let index = {
            let boundaries = self.shared.boundaries.read().unwrap_or_else(|e| e.into_inner());
            if boundaries.is_empty() {
                return TickOutcome::Continue;
            }
            boundaries.active_index(t)
        };

        if self.shared.deliver(index) {
            tracing::trace!(position = t, index = ?index, "Highlight index changed");
        }
        TickOutcome::Continue
    }

    /// 取消循环，可重复调用
    ///
    /// 返回后不会再有回调；同时重置已记录的下标
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.token.cancel();

        if self.shared.is_reentrant() {
            // 回调返回后由 deliver 重置
            return;
        }
        // 等待其他线程上正在执行的回调结束
        self.shared.lock_dispatch().last_index = None;
    }

    /// 播放结束：必要时先通知一次"无高亮"，再取消循环
    pub fn finish(&self) {
        if !self.shared.is_reentrant() {
            self.shared.deliver(None);
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// 最近一次回调的下标
    pub fn last_index(&self) -> Option<usize> {
        if self.shared.is_reentrant() {
            return None;
        }
        self.shared.lock_dispatch().last_index
    }

    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn callback_count(&self) -> u64 {
        self.shared.callbacks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundaryEstimator, TimingSource};
    use std::sync::Mutex as StdMutex;

    /// 手动推进的时钟
    struct FakeClock {
        position: StdMutex<f64>,
        playing: AtomicBool,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                position: StdMutex::new(0.0),
                playing: AtomicBool::new(true),
            })
        }

        fn set(&self, t: f64) {
            *self.position.lock().unwrap() = t;
        }
    }

    impl PlaybackClock for Arc<FakeClock> {
        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        fn position(&self) -> f64 {
            *self.position.lock().unwrap()
        }
    }

    fn boundaries(text: &str, duration: f64) -> SharedBoundaries {
        Arc::new(RwLock::new(
            BoundaryEstimator::default().compute(text, &TimingSource::Absent, Some(duration)),
        ))
    }

    fn recording_sink() -> (HighlightSink, Arc<StdMutex<Vec<Option<usize>>>>) {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let recorder = calls.clone();
        let sink: HighlightSink = Box::new(move |index| recorder.lock().unwrap().push(index));
        (sink, calls)
    }

    #[test]
    fn test_callback_only_on_index_change() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("The cat sat.", 3.0), sink);

        // 严格递增的时钟，每个单词内多帧
        let mut t = 0.0;
        while t < 3.0 {
            clock.set(t);
            assert_eq!(sync.tick(&clock), TickOutcome::Continue);
            t += 0.016;
        }

        assert_eq!(*calls.lock().unwrap(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(sync.callback_count(), 3);
        assert!(sync.tick_count() > 100);
    }

    #[test]
    fn test_after_last_word_reports_none() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("The cat sat.", 3.0), sink);

        for t in [0.5, 2.5, 3.2, 3.4] {
            clock.set(t);
            sync.tick(&clock);
        }

        assert_eq!(*calls.lock().unwrap(), vec![Some(0), Some(2), None]);
    }

    #[test]
    fn test_stops_when_not_playing() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("one two", 1.0), sink);

        clock.playing.store(false, Ordering::SeqCst);
        assert_eq!(sync.tick(&clock), TickOutcome::Stop);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_boundaries_is_noop_tick() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("", 1.0), sink);

        assert_eq!(sync.tick(&clock), TickOutcome::Continue);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent_and_silences() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("The cat sat.", 3.0), sink);

        clock.set(1.0);
        sync.tick(&clock);
        assert_eq!(sync.last_index(), Some(1));

        sync.cancel();
        sync.cancel();
        assert!(sync.is_cancelled());
        assert_eq!(sync.last_index(), None);

        clock.set(2.0);
        assert_eq!(sync.tick(&clock), TickOutcome::Stop);
        assert_eq!(*calls.lock().unwrap(), vec![Some(1)]);
    }

    #[test]
    fn test_finish_reports_none_once() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("The cat sat.", 3.0), sink);

        clock.set(0.1);
        sync.tick(&clock);
        sync.finish();
        sync.finish();

        assert_eq!(*calls.lock().unwrap(), vec![Some(0), None]);
    }

    #[test]
    fn test_cancel_from_inside_callback() {
        let clock = FakeClock::new();
        let slot: Arc<StdMutex<Option<SyncLoop>>> = Arc::new(StdMutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let inner_slot = slot.clone();
        let inner_calls = calls.clone();
        let sink: HighlightSink = Box::new(move |_| {
            inner_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(sync) = inner_slot.lock().unwrap().as_ref() {
                sync.cancel();
            }
        });
        let sync = SyncLoop::new(boundaries("The cat sat.", 3.0), sink);
        *slot.lock().unwrap() = Some(sync.clone());

        clock.set(0.1);
        sync.tick(&clock);
        clock.set(1.0);
        assert_eq!(sync.tick(&clock), TickOutcome::Stop);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sync.is_cancelled());
        assert_eq!(sync.last_index(), None);
    }

    #[test]
    fn test_recomputed_boundaries_take_effect() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let shared = boundaries("The cat sat.", 3.0);
        let sync = SyncLoop::new(shared.clone(), sink);

        clock.set(1.0);
        sync.tick(&clock);

        *shared.write().unwrap() =
            BoundaryEstimator::default().compute("The cat sat.", &TimingSource::Absent, Some(10.0));
        sync.tick(&clock);

        assert_eq!(*calls.lock().unwrap(), vec![Some(1), Some(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_loop_follows_clock() {
        let clock = FakeClock::new();
        let (sink, calls) = recording_sink();
        let sync = SyncLoop::start(
            clock.clone(),
            boundaries("The cat sat.", 3.0),
            sink,
            Duration::from_millis(16),
        );

        for t in [0.2, 1.2, 2.2] {
            clock.set(t);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        sync.cancel();
        clock.set(0.1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*calls.lock().unwrap(), vec![Some(0), Some(1), Some(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_loop_exits_when_paused() {
        let clock = FakeClock::new();
        let (sink, _calls) = recording_sink();
        let sync = SyncLoop::new(boundaries("one two", 1.0), sink);
        let handle = sync.spawn(clock.clone(), Duration::from_millis(16));

        tokio::time::sleep(Duration::from_millis(40)).await;
        clock.playing.store(false, Ordering::SeqCst);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should exit")
            .unwrap();
    }
}
