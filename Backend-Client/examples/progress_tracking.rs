//! Follow per-slot generation progress streamed by a local backend.
//!
//! Connects to the backend's WebSocket, starts a batch sized from the
//! persisted form values and prints every slot as step-ends arrive.
//!
//! ```sh
//! cargo run --example progress_tracking
//! ```

use backend_client::{
    event_names, ClientConfig, ConnectionManager, GenerationProgressStore, KeyValueStore,
    SlotView, SocketFactory,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::default();
    let prefs = KeyValueStore::in_memory();
    let form = prefs.form_values();

    let manager = ConnectionManager::new(SocketFactory::new(&config.socket_path), config);
    let endpoint = manager.connect_standalone().await?;
    println!("Connected to {}", endpoint);

    let health = manager.http_client().health().await?;
    println!("Backend health: {} {}", health.status, health.message);

    let store = Arc::new(Mutex::new(GenerationProgressStore::new()));
    store.lock().unwrap().init_batch(form.number_of_images as usize);

    let sink = Arc::clone(&store);
    let total_steps = form.steps;
    let _sub = manager.events().subscribe(move |event| {
        if !event.is(event_names::IMAGE_GENERATION_STEP_END) {
            println!("  event: {}", event.kind);
            return;
        }
        let mut store = sink.lock().unwrap();
        store.apply(event);
        for i in 0..store.len() {
            match store.slot(i) {
                Some(SlotView::Previewing(step)) => {
                    println!("  slot {}: step {}/{}", i, step.current_step, total_steps)
                }
                Some(SlotView::Finished { item, .. }) => println!("  slot {}: {}", i, item.file_name),
                _ => {}
            }
        }
    });

    println!("Waiting for {} slot(s) of progress...", form.number_of_images);
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(())
}
