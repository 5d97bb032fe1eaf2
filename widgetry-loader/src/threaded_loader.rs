use crate::class_loader::{ClassLoadHandle, ClassLoader, LoadCompletion};
use crate::class_source::WidgetClassSource;
use crate::WidgetLoaderResult;
use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use widgetry_base::{WidgetClass, WidgetClassPath};

type ResidentClasses = Arc<DashMap<WidgetClassPath, Arc<WidgetClass>>>;

// Shared between the handle given to the coordinator and the worker doing the load
#[derive(Default)]
struct LoadState {
    canceled: AtomicBool,
    completed: AtomicBool,
    class: Mutex<Option<Arc<WidgetClass>>>,
}

struct ThreadedLoadHandle {
    state: Arc<LoadState>,
}

impl ClassLoadHandle for ThreadedLoadHandle {
    fn cancel(&self) {
        if !self.state.completed.load(Ordering::Acquire) {
            self.state.canceled.store(true, Ordering::Release);
        }
    }

    fn has_completed(&self) -> bool {
        self.state.completed.load(Ordering::Acquire)
    }

    fn was_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::Acquire)
    }

    fn loaded_class(&self) -> Option<Arc<WidgetClass>> {
        self.state.class.lock().unwrap().clone()
    }
}

struct PendingLoad {
    class_path: WidgetClassPath,
    priority: f32,
    // Breaks priority ties in request order
    sequence: u64,
    state: Arc<LoadState>,
    completion: LoadCompletion,
}

// Max-heap order: highest priority first, then lowest sequence
impl Ord for PendingLoad {
    fn cmp(
        &self,
        other: &Self,
    ) -> CmpOrdering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingLoad {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingLoad {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for PendingLoad {}

type PendingLoadQueue = Arc<Mutex<BinaryHeap<PendingLoad>>>;

// Thread that pops the best pending load each time it is woken and ends when the finish channel is
// signalled
struct ClassLoaderWorkerThread {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

impl ClassLoaderWorkerThread {
    fn new(
        source: Arc<dyn WidgetClassSource>,
        resident: ResidentClasses,
        queue: PendingLoadQueue,
        wake_rx: Receiver<()>,
        active_load_count: Arc<AtomicUsize>,
        thread_index: usize,
    ) -> std::io::Result<Self> {
        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let join_handle = std::thread::Builder::new()
            .name(format!("Widget Class Loader {}", thread_index))
            .spawn(move || {
                profiling::register_thread!(&format!("ClassLoaderWorkerThread {}", thread_index));
                loop {
                    crossbeam_channel::select! {
                        recv(wake_rx) -> msg => {
                            if msg.is_err() {
                                return;
                            }

                            let pending_load = queue.lock().unwrap().pop();
                            if let Some(pending_load) = pending_load {
                                process_load(&*source, &resident, pending_load);
                                active_load_count.fetch_sub(1, Ordering::Release);
                            }
                        },
                        recv(finish_rx) -> _msg => {
                            return;
                        }
                    }
                }
            })?;

        Ok(ClassLoaderWorkerThread {
            finish_tx,
            join_handle,
        })
    }
}

fn process_load(
    source: &dyn WidgetClassSource,
    resident: &ResidentClasses,
    pending_load: PendingLoad,
) {
    profiling::scope!("process_load");
    if pending_load.state.canceled.load(Ordering::Acquire) {
        // Dropping the completion lets the coordinator know nothing is coming
        log::trace!("Skipping canceled load of {}", pending_load.class_path);
        return;
    }

    log::trace!("Start class load {}", pending_load.class_path);
    let resident_class = resident
        .get(&pending_load.class_path)
        .map(|class| class.value().clone());
    let result = match resident_class {
        Some(class) => Ok(class),
        None => source.load_class(&pending_load.class_path),
    };

    match result {
        Ok(class) => {
            resident.insert(pending_load.class_path.clone(), class.clone());
            *pending_load.state.class.lock().unwrap() = Some(class);
        }
        Err(e) => log::warn!(
            "Failed to load widget class {}: {}",
            pending_load.class_path,
            e
        ),
    }

    pending_load.state.completed.store(true, Ordering::Release);
    pending_load.completion.complete();
}

// Spawns N threads, feeds them pending loads, and stops the threads when finished
struct ClassLoaderThreadPool {
    worker_threads: Vec<ClassLoaderWorkerThread>,
    queue: PendingLoadQueue,
    wake_tx: Sender<()>,
    active_load_count: Arc<AtomicUsize>,
}

impl ClassLoaderThreadPool {
    fn new(
        source: Arc<dyn WidgetClassSource>,
        resident: ResidentClasses,
        worker_thread_count: usize,
    ) -> std::io::Result<Self> {
        let (wake_tx, wake_rx) = crossbeam_channel::unbounded();
        let queue = PendingLoadQueue::default();
        let active_load_count = Arc::new(AtomicUsize::new(0));

        let mut worker_threads = Vec::with_capacity(worker_thread_count);
        for thread_index in 0..worker_thread_count {
            let worker = ClassLoaderWorkerThread::new(
                source.clone(),
                resident.clone(),
                queue.clone(),
                wake_rx.clone(),
                active_load_count.clone(),
                thread_index,
            );

            match worker {
                Ok(worker) => worker_threads.push(worker),
                Err(e) => {
                    // Don't leak the threads that did start
                    ClassLoaderThreadPool {
                        worker_threads,
                        queue,
                        wake_tx,
                        active_load_count,
                    }
                    .finish();
                    return Err(e);
                }
            }
        }

        Ok(ClassLoaderThreadPool {
            worker_threads,
            queue,
            wake_tx,
            active_load_count,
        })
    }

    fn add_load(
        &self,
        pending_load: PendingLoad,
    ) {
        self.active_load_count.fetch_add(1, Ordering::Release);
        self.queue.lock().unwrap().push(pending_load);
        // One wake-up per load, whichever worker takes it pops the best load at that time
        let _ = self.wake_tx.send(());
    }

    fn finish(self) {
        for worker_thread in &self.worker_threads {
            let _ = worker_thread.finish_tx.send(());
        }

        for worker_thread in self.worker_threads {
            if worker_thread.join_handle.join().is_err() {
                log::error!("A widget class loader thread panicked");
            }
        }

        // Loads that never started drop their completions here
        self.queue.lock().unwrap().clear();
    }
}

/// A `ClassLoader` that loads classes from a `WidgetClassSource` on a pool of worker threads.
/// Loads are serviced highest priority first, in request order among equal priorities. Loaded
/// classes stay resident for the lifetime of the loader.
pub struct ThreadedClassLoader {
    thread_pool: Option<ClassLoaderThreadPool>,
    resident: ResidentClasses,
    next_sequence: AtomicU64,
}

impl Drop for ThreadedClassLoader {
    fn drop(&mut self) {
        if let Some(thread_pool) = self.thread_pool.take() {
            thread_pool.finish();
        }
    }
}

impl ThreadedClassLoader {
    pub fn new(
        source: Arc<dyn WidgetClassSource>,
        worker_thread_count: usize,
    ) -> WidgetLoaderResult<Self> {
        let worker_thread_count = worker_thread_count.max(1);
        log::info!(
            "Starting widget class loader with {} threads",
            worker_thread_count
        );

        let resident = ResidentClasses::default();
        let thread_pool =
            ClassLoaderThreadPool::new(source, resident.clone(), worker_thread_count)?;

        Ok(ThreadedClassLoader {
            thread_pool: Some(thread_pool),
            resident,
            next_sequence: AtomicU64::new(0),
        })
    }

    /// Makes a class resident without loading it, e.g. classes that ship with the executable.
    pub fn insert_resident_class(
        &self,
        class: Arc<WidgetClass>,
    ) {
        self.resident.insert(class.path().clone(), class);
    }

    pub fn is_resident(
        &self,
        class_path: &WidgetClassPath,
    ) -> bool {
        self.resident.contains_key(class_path)
    }

    pub fn resident_class_count(&self) -> usize {
        self.resident.len()
    }

    /// Loads queued or in progress.
    pub fn pending_load_count(&self) -> usize {
        self.thread_pool
            .as_ref()
            .map(|thread_pool| thread_pool.active_load_count.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl ClassLoader for ThreadedClassLoader {
    fn resident_class(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<Arc<WidgetClass>> {
        self.resident
            .get(class_path)
            .map(|class| class.value().clone())
    }

    fn request_async_load(
        &self,
        class_path: &WidgetClassPath,
        priority: f32,
        completion: LoadCompletion,
    ) -> Box<dyn ClassLoadHandle> {
        log::debug!(
            "request_async_load {} for {} at priority {}",
            class_path,
            completion.request_id(),
            priority
        );

        let state = Arc::new(LoadState::default());
        let pending_load = PendingLoad {
            class_path: class_path.clone(),
            priority,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            state: state.clone(),
            completion,
        };

        if let Some(thread_pool) = &self.thread_pool {
            thread_pool.add_load(pending_load);
        }

        Box::new(ThreadedLoadHandle { state })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_loader::LoaderEvent;
    use crate::WidgetLoaderError;
    use std::time::Duration;
    use widgetry_base::RequestId;

    struct StaticSource;

    impl WidgetClassSource for StaticSource {
        fn load_class(
            &self,
            class_path: &WidgetClassPath,
        ) -> WidgetLoaderResult<Arc<WidgetClass>> {
            if class_path.as_str().contains("Missing") {
                return Err(WidgetLoaderError::ClassNotFound(class_path.clone()));
            }

            Ok(Arc::new(WidgetClass::new(class_path.clone(), None)))
        }
    }

    fn pending_load(
        priority: f32,
        sequence: u64,
    ) -> PendingLoad {
        let (tx, _rx) = crossbeam_channel::unbounded();
        PendingLoad {
            class_path: "/Game/UI/A.A_C".into(),
            priority,
            sequence,
            state: Default::default(),
            completion: LoadCompletion::new(tx, RequestId(sequence + 1)),
        }
    }

    #[test]
    fn queue_pops_highest_priority_then_oldest() {
        let mut heap = BinaryHeap::default();
        heap.push(pending_load(1.0, 0));
        heap.push(pending_load(5.0, 1));
        heap.push(pending_load(1.0, 2));
        heap.push(pending_load(5.0, 3));
        heap.push(pending_load(-2.0, 4));

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|x| x.sequence)).collect();
        assert_eq!(order, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn load_completes_and_becomes_resident() {
        let loader = ThreadedClassLoader::new(Arc::new(StaticSource), 1).unwrap();
        let class_path: WidgetClassPath = "/Game/UI/Shop.Shop_C".into();
        assert!(loader.resident_class(&class_path).is_none());

        let (tx, rx) = crossbeam_channel::unbounded();
        let handle =
            loader.request_async_load(&class_path, 0.0, LoadCompletion::new(tx, RequestId(1)));

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, LoaderEvent::ClassLoaded(RequestId(1))));
        assert!(handle.has_completed());
        assert!(!handle.was_canceled());
        assert_eq!(handle.loaded_class().unwrap().path(), &class_path);
        assert!(loader.is_resident(&class_path));
    }

    #[test]
    fn failed_load_completes_without_class() {
        let loader = ThreadedClassLoader::new(Arc::new(StaticSource), 1).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = loader.request_async_load(
            &"/Game/UI/Missing.Missing_C".into(),
            0.0,
            LoadCompletion::new(tx, RequestId(1)),
        );

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, LoaderEvent::ClassLoaded(RequestId(1))));
        assert!(handle.has_completed());
        assert!(handle.loaded_class().is_none());
        assert_eq!(loader.resident_class_count(), 0);
    }

    #[test]
    fn dropping_the_loader_joins_workers() {
        let loader = ThreadedClassLoader::new(Arc::new(StaticSource), 3).unwrap();
        loader.insert_resident_class(Arc::new(WidgetClass::new("/Game/UI/B.B_C".into(), None)));
        assert!(loader.is_resident(&"/Game/UI/B.B_C".into()));
        drop(loader);
    }
}
