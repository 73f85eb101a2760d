use crate::menu::models::{
	Dish, DishId, DishType, DishTypeId, Pictogram, PictogramId, ServingPlace, ServingPlaceId,
	SubsystemId, SubsystemInfo,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every table of the local menu database.
///
/// Mutations replace whole scopes at a time: a resource always delivers the
/// complete list for its scope, so rows missing from it are deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTables {
	pub dishes: BTreeMap<DishId, Dish>,
	pub dish_types: BTreeMap<DishTypeId, DishType>,
	pub pictograms: BTreeMap<PictogramId, Pictogram>,
	pub serving_places: BTreeMap<ServingPlaceId, ServingPlace>,
	pub infos: BTreeMap<SubsystemId, SubsystemInfo>,
}

impl MenuTables {
	pub fn replace_dishes(&mut self, subsystem_id: SubsystemId, dishes: Vec<Dish>) {
		self.dishes.retain(|_, dish| dish.subsystem_id != subsystem_id);
		self.dishes
			.extend(dishes.into_iter().map(|dish| (dish.id, dish)));
	}

	pub fn replace_serving_places(&mut self, subsystem_id: SubsystemId, places: Vec<ServingPlace>) {
		self.serving_places
			.retain(|_, place| place.subsystem_id != subsystem_id);
		self.serving_places
			.extend(places.into_iter().map(|place| (place.id, place)));
	}

	pub fn replace_dish_types(&mut self, dish_types: Vec<DishType>) {
		self.dish_types = dish_types.into_iter().map(|t| (t.id, t)).collect();
	}

	pub fn replace_pictograms(&mut self, pictograms: Vec<Pictogram>) {
		self.pictograms = pictograms.into_iter().map(|p| (p.id, p)).collect();
	}

	pub fn put_info(&mut self, info: SubsystemInfo) {
		self.infos.insert(info.subsystem_id, info);
	}

	/// Dishes of one subsystem, ordered by id.
	pub fn dishes_of(&self, subsystem_id: SubsystemId) -> Vec<Dish> {
		self.dishes
			.values()
			.filter(|dish| dish.subsystem_id == subsystem_id)
			.cloned()
			.collect()
	}
}
