mod widgets;

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use widgetry::base::{
    PlayerId, RequestId, Requester, WidgetClassRef, WidgetHandle, WidgetInstance,
    WidgetRequestHandler, WorldId,
};
use widgetry::loader::{
    LoadCoordinator, ManifestClassSource, RequestOptions, ThreadedClassLoader,
    WidgetClassSource, WidgetLoaderConfig, WidgetLoaderResult, WidgetPoolManager,
};

pub fn demo_data_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

// Stands in for a game HUD. Widgets that arrive are picked up by the main loop.
#[derive(Default)]
struct Hud {
    arrived: RefCell<Vec<WidgetInstance>>,
    unsuccessful: Cell<usize>,
}

impl WidgetRequestHandler for Hud {
    fn on_widget_requested(
        &self,
        request_id: RequestId,
        class_ref: &WidgetClassRef,
        user_data: i32,
    ) {
        log::info!("{} requested {:?} (user data {})", request_id, class_ref, user_data);
    }

    fn on_widget_loaded(
        &self,
        request_id: RequestId,
        widget: &WidgetInstance,
        user_data: i32,
    ) {
        log::info!("{} loaded {:?} (user data {})", request_id, widget, user_data);
        self.arrived.borrow_mut().push(widget.clone());
    }

    fn on_widget_preallocated(
        &self,
        request_id: RequestId,
        class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
        log::debug!("{} preallocated {:?}", request_id, class_ref);
    }

    fn on_widget_load_failed(
        &self,
        request_id: RequestId,
        class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
        log::warn!("{} failed to load {:?}", request_id, class_ref);
        self.unsuccessful.set(self.unsuccessful.get() + 1);
    }

    fn on_widget_load_cancelled(
        &self,
        request_id: RequestId,
        class_ref: &WidgetClassRef,
        _user_data: i32,
    ) {
        log::info!("{} cancelled {:?}", request_id, class_ref);
        self.unsuccessful.set(self.unsuccessful.get() + 1);
    }
}

fn run() -> WidgetLoaderResult<()> {
    let data_path = demo_data_path();
    let config = WidgetLoaderConfig::read_from_path(&data_path.join("widget_loader_config.json"))?;
    let source = ManifestClassSource::read_from_path(&data_path.join("widget_classes.json"))?;
    log::info!("Manifest lists {:?}", source.class_paths());
    let source = Arc::new(source);

    let class_loader = ThreadedClassLoader::new(source.clone(), config.worker_thread_count)?;
    // The spinner ships with the executable
    class_loader.insert_resident_class(source.load_class(&widgets::LOADING_SPINNER.into())?);

    let mut coordinator = LoadCoordinator::new(
        config,
        Box::new(class_loader),
        Box::new(widgets::create_factory()),
    );
    coordinator.set_default_placeholder_class(WidgetClassRef::new(widgets::LOADING_SPINNER));

    let mut pool_manager = WidgetPoolManager::new();
    pool_manager.initialize(&mut coordinator, WorldId(1), Some(PlayerId(0)));

    let hud = Rc::new(Hud::default());
    let requester = Requester::new(&hud);

    //
    // Kick off requests
    //
    let inventory_ref = WidgetClassRef::new(widgets::INVENTORY);
    let spinner = coordinator.create_placeholder_widget(&inventory_ref, &requester, None);
    let mut inventory_options = RequestOptions::default()
        .with_priority(10.0)
        .with_user_data(1);
    if let Some(spinner) = &spinner {
        inventory_options = inventory_options.with_placeholder(spinner);
    }

    let inventory_request = coordinator.request_widget(
        &inventory_ref,
        &requester,
        Some(Box::new(|request_id: RequestId, widget: &WidgetInstance| {
            if let Some(inventory) = widget.downcast_ref::<widgets::Inventory>() {
                log::info!(
                    "{} inventory has {} slots for {:?}",
                    request_id,
                    inventory.slots,
                    inventory.owner
                );
            }
        })),
        inventory_options,
    );

    let world_map_ref = WidgetClassRef::new(widgets::WORLD_MAP);
    let world_map_request = coordinator.request_widget(
        &world_map_ref,
        &requester,
        None,
        RequestOptions::default().with_user_data(2),
    );
    let unbuildable_request = coordinator.request_widget(
        &WidgetClassRef::new(widgets::UNBUILDABLE),
        &requester,
        None,
        RequestOptions::default().with_user_data(3),
    );

    // Changed our mind about a second map
    let abandoned_request = coordinator.request_widget(
        &world_map_ref,
        &requester,
        None,
        RequestOptions::default().with_user_data(4),
    );
    coordinator.cancel_request(abandoned_request);

    let tooltip_ref = WidgetClassRef::new(widgets::TOOLTIP);
    let tooltip_requests = coordinator.preallocate_widgets(&tooltip_ref, 4, &requester, 1.0);
    log::info!("Preallocating tooltips with requests {:?}", tooltip_requests);

    //
    // Frame loop until everything has arrived
    //
    let start_time = Instant::now();
    let mut handles: Vec<WidgetHandle> = Vec::default();
    while coordinator.active_request_count() > 0 {
        profiling::scope!("frame");
        std::thread::sleep(Duration::from_millis(15));
        coordinator.update();

        let arrived: Vec<_> = hud.arrived.borrow_mut().drain(..).collect();
        for widget in arrived {
            handles.push(coordinator.create_widget_handle(widget));
        }

        if let Some(loading_placeholder) = spinner
            .as_ref()
            .and_then(|spinner| spinner.widget().as_placeholder())
        {
            loading_placeholder.on_loading_progress(start_time.elapsed().as_secs_f32() / 0.5);
        }

        if start_time.elapsed() > Duration::from_secs(10) {
            log::error!(
                "Gave up waiting on {} requests",
                coordinator.active_request_count()
            );
            break;
        }

        profiling::finish_frame!();
    }

    for request_id in [
        inventory_request,
        world_map_request,
        unbuildable_request,
        abandoned_request,
    ] {
        log::info!(
            "{} is {:?}",
            request_id,
            coordinator.get_request_status(request_id)
        );
    }
    log::info!(
        "{} widgets arrived, {} requests did not succeed",
        handles.len(),
        hud.unsuccessful.get()
    );

    if let Some(spinner) = spinner {
        coordinator.release_widget_to_pool(&spinner);
    }

    //
    // Tooltips come out of the pool without constructing anything
    //
    for text in ["Sword", "Shield", "Potion"] {
        if let Some(tooltip) = pool_manager.get_widget(&mut coordinator, &tooltip_ref) {
            if let Some(tooltip_widget) = tooltip.downcast_ref::<widgets::Tooltip>() {
                *tooltip_widget.text.borrow_mut() = text.to_string();
            }
            log::info!("Showing tooltip {:?} in {:?}", text, tooltip);
            pool_manager.release_widget(&mut coordinator, &tooltip, false);
        }
    }

    // Closing the HUD hands every widget back
    handles.clear();
    coordinator.update();

    let settle_time =
        coordinator.config().widget_release_delay + coordinator.config().cleanup_interval;
    std::thread::sleep(settle_time);
    coordinator.update();
    coordinator.run_sweep();

    for pool in coordinator.pools().iter() {
        log::info!("Pool {} {:?}", pool.class_path(), pool.stats());
    }

    coordinator.shutdown();
    Ok(())
}

fn main() {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Debug)
        .init();

    if let Err(e) = run() {
        log::error!("demo-widgets failed: {}", e);
        std::process::exit(1);
    }
}
