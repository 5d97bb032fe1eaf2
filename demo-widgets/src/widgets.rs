use std::cell::{Cell, RefCell};
use std::rc::Rc;
use widgetry::base::{
    CreationContext, LoadingPlaceholder, PlayerId, Widget, WidgetClassRef, WorldId,
};
use widgetry::loader::WidgetFactoryRegistry;

pub const LOADING_SPINNER: &str = "/Game/UI/LoadingSpinner.LoadingSpinner_C";
pub const INVENTORY: &str = "/Game/UI/Inventory.Inventory_C";
pub const WORLD_MAP: &str = "/Game/UI/WorldMap.WorldMap_C";
pub const TOOLTIP: &str = "/Game/UI/Tooltip.Tooltip_C";
// Listed in the manifest, but nothing knows how to construct it
pub const UNBUILDABLE: &str = "/Game/UI/Unbuildable.Unbuildable_C";

#[derive(Default)]
pub struct LoadingSpinner {
    loading: RefCell<Option<WidgetClassRef>>,
    progress: Cell<f32>,
}

impl Widget for LoadingSpinner {
    fn as_placeholder(&self) -> Option<&dyn LoadingPlaceholder> {
        Some(self)
    }
}

impl LoadingPlaceholder for LoadingSpinner {
    fn initialize_placeholder(
        &self,
        class_ref: &WidgetClassRef,
        _loading_context: Option<&dyn std::any::Any>,
    ) {
        log::info!("Spinner shown while {:?} loads", class_ref);
        *self.loading.borrow_mut() = Some(class_ref.clone());
        self.progress.set(0.0);
    }

    fn on_loading_progress(
        &self,
        progress: f32,
    ) {
        self.progress.set(progress.clamp(0.0, 1.0));
    }

    fn prepare_for_replacement(&self) {
        log::info!(
            "Spinner for {:?} fading out at {:.0}%",
            self.loading.borrow(),
            self.progress.get() * 100.0
        );
    }

    fn desired_size(&self) -> (f32, f32) {
        (64.0, 64.0)
    }
}

pub struct Inventory {
    pub owner: Option<PlayerId>,
    pub slots: usize,
}

impl Widget for Inventory {}

pub struct WorldMap {
    pub world: WorldId,
}

impl Widget for WorldMap {}

#[derive(Default)]
pub struct Tooltip {
    pub text: RefCell<String>,
}

impl Widget for Tooltip {}

pub fn create_factory() -> WidgetFactoryRegistry {
    let mut factory = WidgetFactoryRegistry::new();
    factory.register_simple(LOADING_SPINNER, LoadingSpinner::default);
    factory.register_simple(TOOLTIP, Tooltip::default);

    factory.register(INVENTORY, |_, creation_context: &CreationContext| {
        let widget: Rc<dyn Widget> = Rc::new(Inventory {
            owner: creation_context.owning_player,
            slots: 24,
        });
        Ok(widget)
    });

    factory.register(WORLD_MAP, |_, creation_context: &CreationContext| {
        let widget: Rc<dyn Widget> = Rc::new(WorldMap {
            world: creation_context.world,
        });
        Ok(widget)
    });

    factory
}
