use crate::join::DetailSource;
use crate::menu::models::{Dish, DishType, DishTypeId, Pictogram, PictogramId, ServingPlace, ServingPlaceId};
use crate::store::MenuStore;

use futures::stream::BoxStream;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Live dish details backed by the menu store.
#[derive(Clone)]
pub struct MenuDetails {
	store: Arc<MenuStore>,
}

impl MenuDetails {
	pub fn new(store: Arc<MenuStore>) -> Self {
		Self { store }
	}
}

impl DetailSource<Dish> for MenuDetails {
	type Kind = DishType;
	type Pictogram = Pictogram;
	type Place = ServingPlace;

	/// Stays silent while the dish type is missing. After a deletion the
	/// join keeps the last value it saw until the dish is relinked.
	fn kind_of(&self, key: &DishTypeId) -> BoxStream<'static, DishType> {
		let key = *key;
		self.store
			.watch(move |tables| tables.dish_types.get(&key).cloned())
	}

	fn pictogram_of(&self, key: &PictogramId) -> BoxStream<'static, Option<Pictogram>> {
		let key = *key;
		self.store
			.watch(move |tables| Some(tables.pictograms.get(&key).cloned()))
	}

	/// Known places in id order; unknown ids are left out.
	fn serving_places_of(&self, keys: &BTreeSet<ServingPlaceId>) -> BoxStream<'static, Vec<ServingPlace>> {
		let keys = keys.clone();
		self.store.watch(move |tables| {
			Some(
				keys.iter()
					.filter_map(|id| tables.serving_places.get(id).cloned())
					.collect(),
			)
		})
	}
}
