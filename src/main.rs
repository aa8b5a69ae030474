use bonfire::config::env_loader::load_config;
use bonfire::helpers::{crowd_level, format_date, format_time};
use bonfire::map::cluster::Feature;
use bonfire::map::controller::MapController;
use bonfire::map::debounce::debounce;
use bonfire::map::viewport::{Viewport, DEFAULT_MAP_CENTER, DEFAULT_MAP_ZOOM};
use bonfire::store::events::EventStore;
use bonfire::supabase::api::SupabaseClient;
use bonfire::tracing::setup_tracing;
use tracing::{info, warn};

const SCREEN_WIDTH: f64 = 1280.0;
const SCREEN_HEIGHT: f64 = 800.0;

#[tokio::main]
async fn main() {
    let config = load_config();
    let loki = setup_tracing(config.loki_url.as_deref()).await;

    let store = EventStore::new(SupabaseClient::new(&config.supabase));
    let viewport = Viewport::around(DEFAULT_MAP_CENTER, DEFAULT_MAP_ZOOM, SCREEN_WIDTH, SCREEN_HEIGHT);

    store.set_map_bounds(Some(viewport.bounds));
    store.fetch_events(Some(viewport.bounds)).await;

    let events = store.snapshot().events;
    if events.is_empty() {
        warn!("No events around the default map center");
    }

    let mut map = MapController::new(config.map.map_options(), viewport);
    map.replace_items(
        events
            .iter()
            .filter_map(|event| event.coordinates.map(|position| (position, event.id))),
    );

    // Zoom out in steps, as a pinch would, and recompute once it settles.
    let (moves, mut settled, debouncer) = debounce::<Viewport>(config.map.debounce);
    for zoom in [DEFAULT_MAP_ZOOM - 0.5, DEFAULT_MAP_ZOOM - 1.0, DEFAULT_MAP_ZOOM - 1.5] {
        let viewport = Viewport::around(DEFAULT_MAP_CENTER, zoom, SCREEN_WIDTH, SCREEN_HEIGHT);
        if moves.send(viewport).is_err() {
            warn!("Debouncer stopped before zoom {} was sent", zoom);
        }
    }
    drop(moves);

    while let Some(viewport) = settled.recv().await {
        map.set_viewport(viewport);
    }
    if let Err(err) = debouncer.await {
        warn!("Debouncer task failed: {}", err);
    }

    let frame = map.frame();

    for feature in &frame.features {
        match feature {
            Feature::Cluster { id, count, .. } => info!("{}: {} events", id, count),
            Feature::Leaf { item, .. } => {
                if let Some(event) = events.iter().find(|event| event.id == *item) {
                    info!(
                        "{} on {} at {} ({})",
                        event.title,
                        format_date(event.date),
                        format_time(event.time),
                        crowd_level(event)
                    );
                }
            }
        }
    }

    info!("{} events visible", frame.visible.len());

    if let Some((controller, handle)) = loki {
        controller.shutdown().await;
        if let Err(err) = handle.await {
            warn!("Loki background task failed: {}", err);
        }
    }
}
