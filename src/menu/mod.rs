//! The cafeteria menu domain: storage models, syncable resources and the
//! live joined menu view.

pub mod details;
pub mod models;
pub mod resources;

pub use details::MenuDetails;
pub use resources::jobs_for_subsystem;

use crate::join::{self, JoinStream, JoinedView};
use crate::store::MenuStore;
use models::{Dish, SubsystemId};

use std::sync::Arc;

/// Grouped menu of one subsystem, ordered by dish type position.
pub type MenuView = JoinedView<Dish, MenuDetails>;

/// Live menu of `subsystem_id`.
///
/// Emits a new [`MenuView`] after every commit that changes the subsystem's
/// dishes or any dish type, pictogram or serving place they reference.
pub fn observe_menu(store: Arc<MenuStore>, subsystem_id: SubsystemId) -> JoinStream<Dish, MenuDetails> {
	let dishes = store.watch(move |tables| Some(tables.dishes_of(subsystem_id)));
	join::observe(dishes, MenuDetails::new(store))
}
