use crate::class_loader::{ClassLoader, LoadCompletion, LoaderEvent};
use crate::factory::{create_instance, WidgetFactory};
use crate::request::{RequestPurpose, RequestRecord, RequestTable, WidgetLoadedCallback};
use crate::{
    DelayedReleaseQueue, PoolRegistry, PoolStats, RequestInfo, RequestStatus, WidgetLoaderConfig,
    WidgetLoaderError, WidgetLoaderResult,
};
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::rc::Weak;
use std::sync::Arc;
use std::time::Instant;
use widgetry_base::{
    CreationContext, PlayerId, ReleaseOp, RequestId, Requester, Widget, WidgetClass,
    WidgetClassPath, WidgetClassRef, WidgetHandle, WidgetInstance, WorldId,
};

/// Optional parameters of a widget request.
#[derive(Clone)]
pub struct RequestOptions {
    // Higher loads sooner, only a hint to the class loader
    pub priority: f32,
    // Passed back untouched to the requester's hooks
    pub user_data: i32,
    // If false the widget is constructed directly and no pool tracks it
    pub add_to_pool: bool,
    // Told to prepare for replacement right before the loaded widget is delivered
    pub placeholder: Option<Weak<dyn Widget>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            priority: 0.0,
            user_data: 0,
            add_to_pool: true,
            placeholder: None,
        }
    }
}

impl RequestOptions {
    pub fn with_priority(
        mut self,
        priority: f32,
    ) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_user_data(
        mut self,
        user_data: i32,
    ) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_add_to_pool(
        mut self,
        add_to_pool: bool,
    ) -> Self {
        self.add_to_pool = add_to_pool;
        self
    }

    pub fn with_placeholder(
        mut self,
        placeholder: &WidgetInstance,
    ) -> Self {
        self.placeholder = Some(placeholder.downgrade());
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    // The request was pending and has now been cancelled
    Cancelled,
    // The id was issued but nothing is pending for it any more
    AlreadyFinished,
}

// Why the sweep is removing a request
#[derive(Debug, Copy, Clone)]
enum ReapReason {
    RequesterGone,
    HandleCanceled,
}

//
// Tracks widget requests from the moment they are issued until the widget is delivered (or the
// request fails or is cancelled), and owns the pools widgets are recycled through.
//
// Everything here runs on one thread. Class loaders may finish work elsewhere, but their
// completions only take effect when update() drains them. The coordinator holds Rc'd widgets and
// weak requesters, so it cannot be sent to another thread.
//
pub struct LoadCoordinator {
    config: WidgetLoaderConfig,
    class_loader: Box<dyn ClassLoader>,
    factory: Box<dyn WidgetFactory>,

    requests: RequestTable,
    pools: PoolRegistry,
    delayed_releases: DelayedReleaseQueue,
    default_placeholder_class: WidgetClassRef,

    // Completions posted by class loaders
    events_tx: Sender<LoaderEvent>,
    events_rx: Receiver<LoaderEvent>,

    // Releases posted by WidgetHandles
    release_tx: Sender<ReleaseOp>,
    release_rx: Receiver<ReleaseOp>,

    next_sweep_at: Instant,
}

impl LoadCoordinator {
    pub fn new(
        config: WidgetLoaderConfig,
        class_loader: Box<dyn ClassLoader>,
        factory: Box<dyn WidgetFactory>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();

        LoadCoordinator {
            requests: RequestTable::new(config.reclaimed_request_capacity),
            pools: PoolRegistry::new(config.default_max_pool_size),
            delayed_releases: Default::default(),
            default_placeholder_class: WidgetClassRef::null(),
            next_sweep_at: Instant::now() + config.cleanup_interval,
            config,
            class_loader,
            factory,
            events_tx,
            events_rx,
            release_tx,
            release_rx,
        }
    }

    pub fn config(&self) -> &WidgetLoaderConfig {
        &self.config
    }

    pub fn class_loader(&self) -> &dyn ClassLoader {
        &*self.class_loader
    }

    pub fn factory(&self) -> &dyn WidgetFactory {
        &*self.factory
    }

    pub fn creation_context(&self) -> Option<&CreationContext> {
        self.pools.creation_context()
    }

    //
    // Requests
    //

    /// Requests a widget of the given class. Returns `RequestId::NONE` if the arguments are
    /// invalid, in which case nothing else happens.
    ///
    /// If the class is already resident the widget is delivered before this returns. The returned
    /// id is never pending in that case, and `get_request_status` reports it as `Completed`.
    /// Otherwise the class is loaded asynchronously and the widget is delivered from `update()`.
    ///
    /// Callbacks and requester hooks must not call back into the coordinator.
    pub fn request_widget(
        &mut self,
        class_ref: &WidgetClassRef,
        requester: &Requester,
        callback: Option<WidgetLoadedCallback>,
        options: RequestOptions,
    ) -> RequestId {
        match self.try_request_widget(class_ref, requester, callback, options) {
            Ok(request_id) => request_id,
            Err(e) => {
                log::error!("request_widget: {} ({:?})", e, class_ref);
                RequestId::NONE
            }
        }
    }

    #[profiling::function]
    pub fn try_request_widget(
        &mut self,
        class_ref: &WidgetClassRef,
        requester: &Requester,
        callback: Option<WidgetLoadedCallback>,
        options: RequestOptions,
    ) -> WidgetLoaderResult<RequestId> {
        if !requester.is_alive() {
            return Err(WidgetLoaderError::InvalidRequester);
        }

        let class_path = class_ref
            .path()
            .cloned()
            .ok_or(WidgetLoaderError::InvalidResource)?;

        if let Some(class) = self.class_loader.resident_class(&class_path) {
            let request_id = self.requests.allocate_id();
            log::debug!(
                "Request {} for {} is resident, delivering immediately",
                request_id,
                class_path
            );

            match self.resolve_instance(&class, &class_path, options.add_to_pool) {
                Ok(instance) => notify_loaded(
                    request_id,
                    requester,
                    &instance,
                    options.user_data,
                    callback,
                    options.placeholder,
                ),
                Err(e) => {
                    log::error!(
                        "Failed to create widget for request {} ({}): {}",
                        request_id,
                        class_path,
                        e
                    );
                    notify_failed(request_id, requester, class_ref, options.user_data);
                }
            }

            return Ok(request_id);
        }

        let request_id = self.start_async_request(
            class_ref,
            class_path,
            requester,
            RequestPurpose::Widget {
                callback,
                add_to_pool: options.add_to_pool,
            },
            options.priority,
            options.user_data,
            options.placeholder,
        );
        Ok(request_id)
    }

    fn start_async_request(
        &mut self,
        class_ref: &WidgetClassRef,
        class_path: WidgetClassPath,
        requester: &Requester,
        purpose: RequestPurpose,
        priority: f32,
        user_data: i32,
        placeholder: Option<Weak<dyn Widget>>,
    ) -> RequestId {
        let request_id = self.requests.allocate_id();
        log::debug!(
            "Request {} for {} starting async load with priority {}",
            request_id,
            class_path,
            priority
        );

        self.requests.insert(RequestRecord {
            request_id,
            class_ref: class_ref.clone(),
            class_path: class_path.clone(),
            requester: requester.clone(),
            load_handle: None,
            purpose,
            placeholder,
            priority,
            user_data,
            created_at: Instant::now(),
            status: RequestStatus::Loading,
        });

        if let Some(handler) = requester.upgrade() {
            handler.on_widget_requested(request_id, class_ref, user_data);
        }

        let completion = LoadCompletion::new(self.events_tx.clone(), request_id);
        let load_handle = self
            .class_loader
            .request_async_load(&class_path, priority, completion);
        if let Some(record) = self.requests.get_mut(request_id) {
            record.load_handle = Some(load_handle);
        }

        request_id
    }

    /// Cancels a pending request. Returns false only for ids that were never issued.
    pub fn cancel_request(
        &mut self,
        request_id: RequestId,
    ) -> bool {
        match self.try_cancel_request(request_id) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("cancel_request: {}", e);
                false
            }
        }
    }

    /// Cancels a pending request: the load is cancelled, the requester is told (if it still
    /// exists) and the request is forgotten. An issued id with nothing pending reports
    /// `AlreadyFinished` and notifies nobody.
    pub fn try_cancel_request(
        &mut self,
        request_id: RequestId,
    ) -> WidgetLoaderResult<CancelOutcome> {
        if let Some(mut record) = self.requests.remove_reclaimed(request_id) {
            log::debug!("Cancelling request {} for {}", request_id, record.class_path);
            record.cancel();
            if let Some(handler) = record.requester.upgrade() {
                handler.on_widget_load_cancelled(request_id, &record.class_ref, record.user_data);
            }

            Ok(CancelOutcome::Cancelled)
        } else if self.requests.is_issued(request_id) {
            log::trace!("Request {} already finished, nothing to cancel", request_id);
            Ok(CancelOutcome::AlreadyFinished)
        } else {
            Err(WidgetLoaderError::NotFound(request_id))
        }
    }

    pub fn get_request_status(
        &self,
        request_id: RequestId,
    ) -> RequestStatus {
        self.requests.status(request_id)
    }

    //
    // Creation context, pools and releases
    //

    /// Sets the world/player that new widgets are created for, in every existing and future pool.
    pub fn set_creation_context(
        &mut self,
        world: WorldId,
        owning_player: Option<PlayerId>,
    ) {
        self.pools
            .set_creation_context(CreationContext::new(world, owning_player));
    }

    pub fn set_max_pool_size(
        &mut self,
        class_path: &WidgetClassPath,
        max_size: Option<usize>,
    ) {
        self.pools.get_or_create_pool(class_path).set_max_size(max_size);
    }

    pub fn get_or_create_pooled_widget(
        &mut self,
        class: &WidgetClass,
    ) -> Option<WidgetInstance> {
        match self.try_get_or_create_pooled_widget(class) {
            Ok(instance) => Some(instance),
            Err(e) => {
                log::error!("get_or_create_pooled_widget: {}", e);
                None
            }
        }
    }

    pub fn try_get_or_create_pooled_widget(
        &mut self,
        class: &WidgetClass,
    ) -> WidgetLoaderResult<WidgetInstance> {
        let factory = &*self.factory;
        self.pools
            .get_or_create_pool(class.path())
            .get_or_create_instance(class, factory)
    }

    /// Checks out a pooled widget of a class that must already be resident. Never starts a load.
    pub fn try_get_pooled_widget(
        &mut self,
        class_ref: &WidgetClassRef,
    ) -> WidgetLoaderResult<WidgetInstance> {
        let class = self.try_resident_class(class_ref)?;
        self.try_get_or_create_pooled_widget(&class)
    }

    pub fn is_class_loaded(
        &self,
        class_ref: &WidgetClassRef,
    ) -> bool {
        self.try_resident_class(class_ref).is_ok()
    }

    pub(crate) fn try_resident_class(
        &self,
        class_ref: &WidgetClassRef,
    ) -> WidgetLoaderResult<Arc<WidgetClass>> {
        let class_path = class_ref.path().ok_or(WidgetLoaderError::InvalidResource)?;
        self.class_loader
            .resident_class(class_path)
            .ok_or_else(|| WidgetLoaderError::ClassNotResident(class_path.clone()))
    }

    /// Hands a widget back to the pool of `class_path`. Non-immediate releases wait for the
    /// configured release delay and are applied by the sweep.
    pub fn release_widget(
        &mut self,
        widget: &WidgetInstance,
        class_path: &WidgetClassPath,
        immediate: bool,
    ) {
        self.release_widget_at(widget, class_path, immediate, Instant::now());
    }

    /// Immediately releases a widget to the pool of the class it was created from.
    pub fn release_widget_to_pool(
        &mut self,
        widget: &WidgetInstance,
    ) {
        let class_path = widget.class_path().clone();
        self.release_widget(widget, &class_path, true);
    }

    fn release_widget_at(
        &mut self,
        widget: &WidgetInstance,
        class_path: &WidgetClassPath,
        immediate: bool,
        now: Instant,
    ) {
        if immediate {
            // A release now supersedes a pending delayed release of the same widget
            if self.delayed_releases.remove_instance(widget.id()) {
                log::trace!("Dropped pending delayed release of {:?}", widget.id());
            }
            self.release_to_pool(widget, class_path);
        } else {
            let release_at = now + self.config.widget_release_delay;
            self.delayed_releases
                .push(widget.clone(), class_path.clone(), release_at);
        }
    }

    fn release_to_pool(
        &mut self,
        widget: &WidgetInstance,
        class_path: &WidgetClassPath,
    ) {
        match self.pools.pool_mut(class_path) {
            Some(pool) => {
                let result = pool.release(widget);
                log::trace!("Released {:?} to {}: {:?}", widget.id(), class_path, result);
            }
            None => log::warn!(
                "{}. Only widgets created through this coordinator can be released to it",
                WidgetLoaderError::PoolNotFound(class_path.clone())
            ),
        }
    }

    /// Returns every checked out widget to its pool, including those waiting on a delayed release.
    pub fn release_all_widgets(&mut self) {
        log::debug!("Releasing all widgets");
        self.delayed_releases.clear();
        self.pools.release_all();
    }

    /// Makes every pool forget all of its widgets.
    pub fn reset_widget_pools(&mut self) {
        log::debug!("Resetting all widget pools");
        self.delayed_releases.clear();
        self.pools.reset_all();
    }

    /// Wraps a checked out widget in a handle that releases it when dropped.
    pub fn create_widget_handle(
        &self,
        widget: WidgetInstance,
    ) -> WidgetHandle {
        let class_path = widget.class_path().clone();
        WidgetHandle::new(self.release_tx.clone(), widget, class_path)
    }

    //
    // Preallocation
    //

    /// Fills the pool for a class ahead of time. Returns the ids of the requests issued if the
    /// class had to be loaded first, or nothing if it was resident and the pool was filled
    /// synchronously.
    pub fn preallocate_widgets(
        &mut self,
        class_ref: &WidgetClassRef,
        count: usize,
        requester: &Requester,
        priority: f32,
    ) -> Vec<RequestId> {
        match self.try_preallocate_widgets(class_ref, count, requester, priority) {
            Ok(request_ids) => request_ids,
            Err(e) => {
                log::error!("preallocate_widgets: {} ({:?})", e, class_ref);
                Vec::default()
            }
        }
    }

    pub fn try_preallocate_widgets(
        &mut self,
        class_ref: &WidgetClassRef,
        count: usize,
        requester: &Requester,
        priority: f32,
    ) -> WidgetLoaderResult<Vec<RequestId>> {
        let class_path = class_ref
            .path()
            .cloned()
            .ok_or(WidgetLoaderError::InvalidResource)?;
        if count == 0 {
            return Err(WidgetLoaderError::InvalidCount);
        }
        if !requester.is_alive() {
            return Err(WidgetLoaderError::InvalidRequester);
        }

        if let Some(class) = self.class_loader.resident_class(&class_path) {
            log::debug!("Preallocating {} widgets of {}", count, class_path);
            self.preallocate_resident(&class, count)?;
            return Ok(Vec::default());
        }

        let mut request_ids = Vec::with_capacity(count);
        for _ in 0..count {
            request_ids.push(self.start_async_request(
                class_ref,
                class_path.clone(),
                requester,
                RequestPurpose::Preallocate,
                priority,
                0,
                None,
            ));
        }

        Ok(request_ids)
    }

    pub(crate) fn preallocate_resident(
        &mut self,
        class: &WidgetClass,
        count: usize,
    ) -> WidgetLoaderResult<()> {
        let factory = &*self.factory;
        self.pools
            .get_or_create_pool(class.path())
            .prefill(class, factory, count)
    }

    //
    // Placeholders
    //

    pub fn set_default_placeholder_class(
        &mut self,
        class_ref: WidgetClassRef,
    ) {
        self.default_placeholder_class = class_ref;
    }

    pub fn default_placeholder_class(&self) -> &WidgetClassRef {
        &self.default_placeholder_class
    }

    /// Checks out a widget of the default placeholder class to show while `class_ref` loads. The
    /// placeholder class must already be resident. Release the placeholder like any other pooled
    /// widget once it is no longer shown.
    pub fn create_placeholder_widget(
        &mut self,
        class_ref: &WidgetClassRef,
        requester: &Requester,
        loading_context: Option<&dyn Any>,
    ) -> Option<WidgetInstance> {
        if !requester.is_alive() {
            log::warn!("create_placeholder_widget: {}", WidgetLoaderError::InvalidRequester);
            return None;
        }

        if self.default_placeholder_class.is_null() {
            log::debug!("No default placeholder class set, not creating a placeholder");
            return None;
        }

        let placeholder_class_ref = self.default_placeholder_class.clone();
        let placeholder = match self.try_get_pooled_widget(&placeholder_class_ref) {
            Ok(placeholder) => placeholder,
            Err(e) => {
                log::warn!("create_placeholder_widget: {}", e);
                return None;
            }
        };

        match placeholder.widget().as_placeholder() {
            Some(loading_placeholder) => {
                loading_placeholder.initialize_placeholder(class_ref, loading_context)
            }
            None => log::debug!(
                "Placeholder class {:?} does not implement LoadingPlaceholder",
                placeholder_class_ref
            ),
        }

        Some(placeholder)
    }

    //
    // Per-frame processing
    //

    /// Applies finished loads and handle releases, then runs the sweep if the cleanup interval has
    /// passed. Call this once per frame on the thread that owns the coordinator.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    #[profiling::function]
    pub fn update_at(
        &mut self,
        now: Instant,
    ) {
        self.process_loader_events();
        self.process_release_ops(now);

        if now >= self.next_sweep_at {
            self.run_sweep_at(now);
            self.next_sweep_at = now + self.config.cleanup_interval;
        }
    }

    fn process_loader_events(&mut self) {
        while let Ok(loader_event) = self.events_rx.try_recv() {
            log::trace!("handle event {:?}", loader_event);
            match loader_event {
                LoaderEvent::ClassLoaded(request_id) => self.handle_class_loaded(request_id),
                LoaderEvent::CompletionDropped(request_id) => {
                    self.handle_completion_dropped(request_id)
                }
            }
        }
    }

    fn process_release_ops(
        &mut self,
        now: Instant,
    ) {
        while let Ok(release_op) = self.release_rx.try_recv() {
            match release_op {
                ReleaseOp::Release {
                    widget,
                    class_path,
                    immediate,
                } => self.release_widget_at(&widget, &class_path, immediate, now),
            }
        }
    }

    fn handle_class_loaded(
        &mut self,
        request_id: RequestId,
    ) {
        let requester_alive = match self.requests.get(request_id) {
            Some(record) => record.requester.is_alive(),
            None => {
                log::debug!(
                    "Load finished for request {} which is no longer pending",
                    request_id
                );
                return;
            }
        };

        if !requester_alive {
            log::warn!(
                "{}, discarding the loaded class",
                WidgetLoaderError::RequesterGone(request_id)
            );
            if let Some(mut record) = self.requests.remove_reclaimed(request_id) {
                record.cancel();
            }
            return;
        }

        let record = match self.requests.remove(request_id) {
            Some(record) => record,
            None => return,
        };

        let RequestRecord {
            class_ref,
            class_path,
            requester,
            load_handle,
            purpose,
            placeholder,
            user_data,
            ..
        } = record;

        let class = load_handle
            .and_then(|load_handle| load_handle.loaded_class())
            .filter(|class| class.path() == &class_path);
        let class = match class {
            Some(class) => class,
            None => {
                log::error!(
                    "Failed to load class {} for request {}",
                    class_path,
                    request_id
                );
                notify_failed(request_id, &requester, &class_ref, user_data);
                return;
            }
        };

        let (callback, add_to_pool) = match purpose {
            RequestPurpose::Widget {
                callback,
                add_to_pool,
            } => (callback, add_to_pool),
            RequestPurpose::Preallocate => {
                // The widget stays in the pool, the requester only hears that it is there
                let factory = &*self.factory;
                let result = self
                    .pools
                    .get_or_create_pool(&class_path)
                    .preallocate_instance(&class, factory);
                match result {
                    Ok(instance_id) => {
                        log::debug!("Request {} preallocated {:?}", request_id, instance_id);
                        if let Some(handler) = requester.upgrade() {
                            handler.on_widget_preallocated(request_id, &class_ref, user_data);
                        }
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to preallocate widget for request {} ({}): {}",
                            request_id,
                            class_path,
                            e
                        );
                        notify_failed(request_id, &requester, &class_ref, user_data);
                    }
                }
                return;
            }
        };

        match self.resolve_instance(&class, &class_path, add_to_pool) {
            Ok(instance) => {
                log::debug!("Request {} completed with {:?}", request_id, instance.id());
                notify_loaded(
                    request_id,
                    &requester,
                    &instance,
                    user_data,
                    callback,
                    placeholder,
                );
            }
            Err(e) => {
                log::error!(
                    "Failed to create widget for request {} ({}): {}",
                    request_id,
                    class_path,
                    e
                );
                notify_failed(request_id, &requester, &class_ref, user_data);
            }
        }
    }

    fn handle_completion_dropped(
        &mut self,
        request_id: RequestId,
    ) {
        let (has_completed, was_canceled) = match self
            .requests
            .get(request_id)
            .and_then(|record| record.load_handle.as_ref())
        {
            Some(load_handle) => (load_handle.has_completed(), load_handle.was_canceled()),
            None => return,
        };

        if was_canceled {
            log::debug!(
                "Class loader dropped the completion for cancelled request {}, the sweep will reclaim it",
                request_id
            );
            return;
        }

        if has_completed {
            log::debug!(
                "Class loader finished request {} without completing it, delivering now",
                request_id
            );
            self.handle_class_loaded(request_id);
            return;
        }

        // Nothing will ever finish this load
        let record = match self.requests.remove(request_id) {
            Some(record) => record,
            None => return,
        };
        log::warn!(
            "{}",
            WidgetLoaderError::LoadFailure(format!(
                "class loader abandoned request {} for {}",
                request_id, record.class_path
            ))
        );
        notify_failed(
            request_id,
            &record.requester,
            &record.class_ref,
            record.user_data,
        );
    }

    // Gets a widget for a loaded class, pooled or not
    fn resolve_instance(
        &mut self,
        class: &WidgetClass,
        class_path: &WidgetClassPath,
        add_to_pool: bool,
    ) -> WidgetLoaderResult<WidgetInstance> {
        let factory = &*self.factory;
        if add_to_pool {
            return self
                .pools
                .get_or_create_pool(class_path)
                .get_or_create_instance(class, factory);
        }

        let creation_context = self.pools.creation_context().ok_or_else(|| {
            log::error!(
                "Cannot create an unpooled widget of {}, no creation context has been set",
                class_path
            );
            WidgetLoaderError::Uninitialized(class_path.clone())
        })?;
        create_instance(factory, class, creation_context)
    }

    //
    // Sweep
    //

    /// Runs one cleanup pass immediately, regardless of the cleanup interval.
    pub fn run_sweep(&mut self) {
        self.run_sweep_at(Instant::now());
    }

    pub fn run_sweep_at(
        &mut self,
        now: Instant,
    ) {
        self.cleanup_requests();
        self.process_delayed_releases_at(now);
    }

    /// Reclaims requests whose requester is gone or whose load was cancelled outside the
    /// coordinator. Requests whose load finished but hasn't been delivered yet are left alone.
    #[profiling::function]
    pub fn cleanup_requests(&mut self) {
        let mut to_reap = Vec::default();
        for request_id in self.requests.ids() {
            let record = match self.requests.get(request_id) {
                Some(record) => record,
                None => continue,
            };

            if !record.requester.is_alive() {
                log::trace!("Removing request {} with invalid requester", request_id);
                to_reap.push((request_id, ReapReason::RequesterGone));
                continue;
            }

            if let Some(load_handle) = &record.load_handle {
                if record.status == RequestStatus::Loading && load_handle.has_completed() {
                    log::trace!(
                        "Handle for request {} completed, but the completion hasn't been delivered yet",
                        request_id
                    );
                    continue;
                }

                if load_handle.was_canceled() {
                    log::trace!("Removing cancelled request {}", request_id);
                    to_reap.push((request_id, ReapReason::HandleCanceled));
                }
            }
        }

        for (request_id, reason) in to_reap {
            let mut record = match self.requests.remove_reclaimed(request_id) {
                Some(record) => record,
                None => continue,
            };

            record.cancel();
            match reason {
                ReapReason::RequesterGone => {
                    log::debug!("{}", WidgetLoaderError::RequesterGone(request_id))
                }
                ReapReason::HandleCanceled => {
                    log::debug!("Load for request {} was cancelled externally", request_id);
                    if let Some(handler) = record.requester.upgrade() {
                        handler.on_widget_load_cancelled(
                            request_id,
                            &record.class_ref,
                            record.user_data,
                        );
                    }
                }
            }
        }
    }

    /// Returns delayed releases whose deadline has passed to their pools.
    pub fn process_delayed_releases(&mut self) {
        self.process_delayed_releases_at(Instant::now());
    }

    #[profiling::function]
    pub fn process_delayed_releases_at(
        &mut self,
        now: Instant,
    ) {
        for delayed_release in self.delayed_releases.take_matured(now) {
            self.release_to_pool(&delayed_release.widget, &delayed_release.class_path);
        }
    }

    /// Cancels everything pending and empties every pool.
    pub fn shutdown(&mut self) {
        log::info!(
            "Shutting down widget loader with {} pending requests",
            self.requests.len()
        );
        for request_id in self.requests.ids() {
            let _ = self.try_cancel_request(request_id);
        }

        self.reset_widget_pools();
    }

    //
    // Diagnostics
    //

    pub fn active_request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn request_info(
        &self,
        request_id: RequestId,
    ) -> Option<RequestInfo> {
        let now = Instant::now();
        self.requests.get(request_id).map(|record| record.info(now))
    }

    pub fn pending_requests(&self) -> Vec<RequestInfo> {
        let now = Instant::now();
        let mut infos: Vec<_> = self.requests.iter().map(|record| record.info(now)).collect();
        infos.sort_by_key(|info| info.request_id);
        infos
    }

    pub fn pool_stats(
        &self,
        class_path: &WidgetClassPath,
    ) -> Option<PoolStats> {
        self.pools.stats(class_path)
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn delayed_release_count(&self) -> usize {
        self.delayed_releases.len()
    }
}

fn notify_loaded(
    request_id: RequestId,
    requester: &Requester,
    instance: &WidgetInstance,
    user_data: i32,
    callback: Option<WidgetLoadedCallback>,
    placeholder: Option<Weak<dyn Widget>>,
) {
    if let Some(placeholder) = placeholder.and_then(|placeholder| placeholder.upgrade()) {
        if let Some(loading_placeholder) = placeholder.as_placeholder() {
            loading_placeholder.prepare_for_replacement();
        }
    }

    if let Some(callback) = callback {
        (callback)(request_id, instance);
    }

    if let Some(handler) = requester.upgrade() {
        handler.on_widget_loaded(request_id, instance, user_data);
    }
}

fn notify_failed(
    request_id: RequestId,
    requester: &Requester,
    class_ref: &WidgetClassRef,
    user_data: i32,
) {
    if let Some(handler) = requester.upgrade() {
        handler.on_widget_load_failed(request_id, class_ref, user_data);
    }
}
