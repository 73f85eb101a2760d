use cafeteria_sync::api::MenuApiClient;
use cafeteria_sync::config::Config;
use cafeteria_sync::menu::{self, MenuView};
use cafeteria_sync::store::MenuStore;
use cafeteria_sync::sync::{EventDispatcher, FileDigestStore, StatusHandler, SyncEngine, SyncStatus};

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cafeteria_sync=debug")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load config: {}", e);
			return;
		}
	};
	info!(
		"Syncing subsystem {} from {} into {:?}",
		config.subsystem_id, config.api_base_url, config.data_dir
	);

	let client = match MenuApiClient::new(&config.api_base_url, config.request_timeout()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create API client: {}", e);
			return;
		}
	};

	let digests = match FileDigestStore::open(&config.data_dir).await {
		Ok(digests) => Arc::new(digests),
		Err(e) => {
			error!("Failed to open digest store: {}", e);
			return;
		}
	};

	let store = match MenuStore::open(&config.data_dir).await {
		Ok(store) => Arc::new(store),
		Err(e) => {
			error!("Failed to open menu store: {}", e);
			return;
		}
	};

	let (status_handler, status) = StatusHandler::new();
	let mut dispatcher = EventDispatcher::new();
	dispatcher.register_handler(Arc::new(status_handler));

	let engine = SyncEngine::new(digests, store.clone(), config.sync.clone()).with_dispatcher(dispatcher);

	// Subscribe first so the view reflects the commit as soon as it lands.
	let mut menu_view = menu::observe_menu(store.clone(), config.subsystem_id);

	match engine
		.run(menu::jobs_for_subsystem(&client, config.subsystem_id))
		.await
	{
		Ok(report) => info!("Sync finished: {}", report.summary()),
		Err(e) => warn!("Sync failed, showing the last stored menu: {}", e),
	}
	if let SyncStatus::Failed(reason) = &*status.borrow() {
		warn!("Last sync status: failed ({})", reason);
	}

	match tokio::time::timeout(Duration::from_secs(5), menu_view.next()).await {
		Ok(Some(view)) => log_menu(&view),
		Ok(None) => warn!("Menu view ended before producing a value"),
		Err(_) => warn!("Menu is incomplete: some dishes reference unknown dish types"),
	}
}

fn log_menu(view: &MenuView) {
	if view.is_empty() {
		info!("No dishes on the menu");
		return;
	}

	for record in view {
		info!("{}", record.kind.name);
		for joined in &record.rows {
			let dish = &joined.row;
			let price = dish
				.price_student
				.map(|cents| format!("{}.{:02}", cents / 100, cents % 100))
				.unwrap_or_else(|| "-".to_string());
			let places: Vec<&str> = joined
				.serving_places
				.iter()
				.map(|place| place.abbreviation.as_deref().unwrap_or(place.name.as_str()))
				.collect();
			let pictogram = joined.pictogram.as_ref().map(|p| p.name.as_str()).unwrap_or("");

			info!("  {} {} [{}] {}", dish.name, price, places.join(", "), pictogram);
		}
	}
}
