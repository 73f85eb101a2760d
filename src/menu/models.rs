//! Storage shapes of the cafeteria menu.

use crate::join::{DisplayOrder, JoinRow};

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type SubsystemId = u32;
pub type DishId = u64;
pub type DishTypeId = u32;
pub type PictogramId = u32;
pub type ServingPlaceId = u32;

/// A dish offered by one subsystem (a canteen or cafeteria).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
	pub id: DishId,
	pub subsystem_id: SubsystemId,
	pub name: String,
	pub side_dishes: Option<String>,
	/// Prices in cents; absent when the dish is not sold to that group.
	pub price_student: Option<u32>,
	pub price_staff: Option<u32>,
	pub allergens: BTreeSet<String>,
	pub dish_type_id: DishTypeId,
	pub pictogram_id: Option<PictogramId>,
	pub serving_place_ids: BTreeSet<ServingPlaceId>,
}

/// Menu category, e.g. "Soup" or "Main course".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishType {
	pub id: DishTypeId,
	pub name: String,
	pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pictogram {
	pub id: PictogramId,
	pub name: String,
	pub description: Option<String>,
}

/// A counter or room where dishes are handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingPlace {
	pub id: ServingPlaceId,
	pub subsystem_id: SubsystemId,
	pub name: String,
	pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
	pub weekday: Weekday,
	pub opens: NaiveTime,
	pub closes: NaiveTime,
}

/// Contact details and opening hours of a subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemInfo {
	pub subsystem_id: SubsystemId,
	pub name: String,
	pub address: Option<String>,
	pub phone: Option<String>,
	pub email: Option<String>,
	pub opening_hours: Vec<OpeningHours>,
}

impl JoinRow for Dish {
	type RowKey = DishId;
	type KindKey = DishTypeId;
	type PictogramKey = PictogramId;
	type PlaceKey = ServingPlaceId;

	fn row_key(&self) -> DishId {
		self.id
	}

	fn kind_key(&self) -> DishTypeId {
		self.dish_type_id
	}

	fn pictogram_key(&self) -> Option<PictogramId> {
		self.pictogram_id
	}

	fn serving_place_keys(&self) -> BTreeSet<ServingPlaceId> {
		self.serving_place_ids.clone()
	}
}

impl DisplayOrder for DishType {
	fn display_order(&self) -> i32 {
		self.position
	}
}
