//! Wire types of the cafeteria menu API

use crate::menu::models::SubsystemId;

use serde::{Deserialize, Serialize};

/// Dish as delivered by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishDto {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub side_dishes: Option<String>,
	/// Decimal price, either "2.50" or "2,50".
	#[serde(default)]
	pub price_student: Option<String>,
	#[serde(default)]
	pub price_staff: Option<String>,
	/// Comma separated allergen codes, e.g. "A, C, G".
	#[serde(default)]
	pub allergens: Option<String>,
	pub dish_type_id: u32,
	#[serde(default)]
	pub pictogram_id: Option<u32>,
	#[serde(default)]
	pub serving_place_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishTypeDto {
	pub id: u32,
	pub name: String,
	pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictogramDto {
	pub id: u32,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingPlaceDto {
	pub id: u32,
	pub name: String,
	#[serde(default)]
	pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningHoursDto {
	/// English weekday name, e.g. "Monday" or "mon".
	pub weekday: String,
	/// "HH:MM"
	pub opens: String,
	pub closes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsystemInfoDto {
	pub name: String,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub opening_hours: Vec<OpeningHoursDto>,
}

/// Resources served by the menu API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
	Dishes(SubsystemId),
	DishTypes,
	Pictograms,
	ServingPlaces(SubsystemId),
	Info(SubsystemId),
}

impl Endpoint {
	pub fn path(&self) -> String {
		match self {
			Endpoint::Dishes(id) => format!("subsystems/{}/dishes", id),
			Endpoint::DishTypes => "dish-types".to_string(),
			Endpoint::Pictograms => "pictograms".to_string(),
			Endpoint::ServingPlaces(id) => format!("subsystems/{}/serving-places", id),
			Endpoint::Info(id) => format!("subsystems/{}/info", id),
		}
	}
}
