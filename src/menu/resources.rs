//! Syncable resources of the cafeteria menu API.
//!
//! Every resource fetches one endpoint, validates the wire shape into the
//! storage shape and replaces its scope in [`MenuTables`].

use crate::api::client::MenuApiClient;
use crate::api::types::{
	DishDto, DishTypeDto, Endpoint, OpeningHoursDto, PictogramDto, ServingPlaceDto, SubsystemInfoDto,
};
use crate::menu::models::{
	Dish, DishType, OpeningHours, Pictogram, ServingPlace, SubsystemId, SubsystemInfo,
};
use crate::store::MenuTables;
use crate::sync::job::{DigestedResource, Job, Resource};
use crate::sync::types::{ConversionError, Digest, RemoteError, ResourceKey};

use chrono::{NaiveTime, Weekday};
use std::collections::BTreeSet;

/// Build the batch that brings one subsystem's menu up to date.
///
/// Jobs are single-use, so every sync run asks for a fresh batch.
pub fn jobs_for_subsystem(client: &MenuApiClient, subsystem_id: SubsystemId) -> Vec<Job<MenuTables>> {
	vec![
		Job::digest_gated(DishTypesResource::new(client.clone()), ()),
		Job::digest_gated(PictogramsResource::new(client.clone()), ()),
		Job::digest_gated(ServingPlacesResource::new(client.clone()), subsystem_id),
		Job::digest_gated(DishesResource::new(client.clone()), subsystem_id),
		Job::unconditional(InfoResource::new(client.clone()), subsystem_id),
	]
}

pub struct DishesResource {
	client: MenuApiClient,
}

impl DishesResource {
	pub fn new(client: MenuApiClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Resource<MenuTables> for DishesResource {
	type Params = SubsystemId;
	type Payload = Vec<DishDto>;
	type Record = Vec<Dish>;

	fn name(&self) -> &'static str {
		"dishes"
	}

	async fn fetch(&self, subsystem_id: &SubsystemId) -> Result<Vec<DishDto>, RemoteError> {
		self.client.fetch(&Endpoint::Dishes(*subsystem_id)).await
	}

	fn convert(
		&self,
		subsystem_id: &SubsystemId,
		payload: Vec<DishDto>,
	) -> Result<Vec<Dish>, ConversionError> {
		payload
			.into_iter()
			.map(|dto| convert_dish(*subsystem_id, dto))
			.collect()
	}

	fn apply(&self, subsystem_id: &SubsystemId, record: Vec<Dish>, tables: &mut MenuTables) {
		tables.replace_dishes(*subsystem_id, record);
	}
}

#[async_trait::async_trait]
impl DigestedResource<MenuTables> for DishesResource {
	fn key(&self, subsystem_id: &SubsystemId) -> ResourceKey {
		ResourceKey::new("dishes", subsystem_id)
	}

	async fn digest_of(&self, subsystem_id: &SubsystemId) -> Result<Digest, RemoteError> {
		self.client.digest(&Endpoint::Dishes(*subsystem_id)).await
	}
}

pub struct DishTypesResource {
	client: MenuApiClient,
}

impl DishTypesResource {
	pub fn new(client: MenuApiClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Resource<MenuTables> for DishTypesResource {
	type Params = ();
	type Payload = Vec<DishTypeDto>;
	type Record = Vec<DishType>;

	fn name(&self) -> &'static str {
		"dish-types"
	}

	async fn fetch(&self, _params: &()) -> Result<Vec<DishTypeDto>, RemoteError> {
		self.client.fetch(&Endpoint::DishTypes).await
	}

	fn convert(&self, _params: &(), payload: Vec<DishTypeDto>) -> Result<Vec<DishType>, ConversionError> {
		payload
			.into_iter()
			.map(|dto| {
				Ok(DishType {
					id: dto.id,
					name: require_name("dish-types", dto.name)?,
					position: dto.position,
				})
			})
			.collect()
	}

	fn apply(&self, _params: &(), record: Vec<DishType>, tables: &mut MenuTables) {
		tables.replace_dish_types(record);
	}
}

#[async_trait::async_trait]
impl DigestedResource<MenuTables> for DishTypesResource {
	fn key(&self, _params: &()) -> ResourceKey {
		ResourceKey::global("dish-types")
	}

	async fn digest_of(&self, _params: &()) -> Result<Digest, RemoteError> {
		self.client.digest(&Endpoint::DishTypes).await
	}
}

pub struct PictogramsResource {
	client: MenuApiClient,
}

impl PictogramsResource {
	pub fn new(client: MenuApiClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Resource<MenuTables> for PictogramsResource {
	type Params = ();
	type Payload = Vec<PictogramDto>;
	type Record = Vec<Pictogram>;

	fn name(&self) -> &'static str {
		"pictograms"
	}

	async fn fetch(&self, _params: &()) -> Result<Vec<PictogramDto>, RemoteError> {
		self.client.fetch(&Endpoint::Pictograms).await
	}

	fn convert(&self, _params: &(), payload: Vec<PictogramDto>) -> Result<Vec<Pictogram>, ConversionError> {
		payload
			.into_iter()
			.map(|dto| {
				Ok(Pictogram {
					id: dto.id,
					name: require_name("pictograms", dto.name)?,
					description: non_blank(dto.description),
				})
			})
			.collect()
	}

	fn apply(&self, _params: &(), record: Vec<Pictogram>, tables: &mut MenuTables) {
		tables.replace_pictograms(record);
	}
}

#[async_trait::async_trait]
impl DigestedResource<MenuTables> for PictogramsResource {
	fn key(&self, _params: &()) -> ResourceKey {
		ResourceKey::global("pictograms")
	}

	async fn digest_of(&self, _params: &()) -> Result<Digest, RemoteError> {
		self.client.digest(&Endpoint::Pictograms).await
	}
}

pub struct ServingPlacesResource {
	client: MenuApiClient,
}

impl ServingPlacesResource {
	pub fn new(client: MenuApiClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Resource<MenuTables> for ServingPlacesResource {
	type Params = SubsystemId;
	type Payload = Vec<ServingPlaceDto>;
	type Record = Vec<ServingPlace>;

	fn name(&self) -> &'static str {
		"serving-places"
	}

	async fn fetch(&self, subsystem_id: &SubsystemId) -> Result<Vec<ServingPlaceDto>, RemoteError> {
		self.client.fetch(&Endpoint::ServingPlaces(*subsystem_id)).await
	}

	fn convert(
		&self,
		subsystem_id: &SubsystemId,
		payload: Vec<ServingPlaceDto>,
	) -> Result<Vec<ServingPlace>, ConversionError> {
		payload
			.into_iter()
			.map(|dto| {
				Ok(ServingPlace {
					id: dto.id,
					subsystem_id: *subsystem_id,
					name: require_name("serving-places", dto.name)?,
					abbreviation: non_blank(dto.abbreviation),
				})
			})
			.collect()
	}

	fn apply(&self, subsystem_id: &SubsystemId, record: Vec<ServingPlace>, tables: &mut MenuTables) {
		tables.replace_serving_places(*subsystem_id, record);
	}
}

#[async_trait::async_trait]
impl DigestedResource<MenuTables> for ServingPlacesResource {
	fn key(&self, subsystem_id: &SubsystemId) -> ResourceKey {
		ResourceKey::new("serving-places", subsystem_id)
	}

	async fn digest_of(&self, subsystem_id: &SubsystemId) -> Result<Digest, RemoteError> {
		self.client.digest(&Endpoint::ServingPlaces(*subsystem_id)).await
	}
}

/// Contact details and opening hours. The endpoint has no digest, so it is
/// refreshed on every run.
pub struct InfoResource {
	client: MenuApiClient,
}

impl InfoResource {
	pub fn new(client: MenuApiClient) -> Self {
		Self { client }
	}
}

#[async_trait::async_trait]
impl Resource<MenuTables> for InfoResource {
	type Params = SubsystemId;
	type Payload = SubsystemInfoDto;
	type Record = SubsystemInfo;

	fn name(&self) -> &'static str {
		"info"
	}

	async fn fetch(&self, subsystem_id: &SubsystemId) -> Result<SubsystemInfoDto, RemoteError> {
		self.client.fetch(&Endpoint::Info(*subsystem_id)).await
	}

	fn convert(
		&self,
		subsystem_id: &SubsystemId,
		payload: SubsystemInfoDto,
	) -> Result<SubsystemInfo, ConversionError> {
		convert_info(*subsystem_id, payload)
	}

	fn apply(&self, _subsystem_id: &SubsystemId, record: SubsystemInfo, tables: &mut MenuTables) {
		tables.put_info(record);
	}
}

fn convert_dish(subsystem_id: SubsystemId, dto: DishDto) -> Result<Dish, ConversionError> {
	let allergens: BTreeSet<String> = dto
		.allergens
		.as_deref()
		.unwrap_or_default()
		.split(',')
		.map(str::trim)
		.filter(|code| !code.is_empty())
		.map(str::to_string)
		.collect();

	Ok(Dish {
		id: dto.id,
		subsystem_id,
		name: require_name("dishes", dto.name)?,
		side_dishes: non_blank(dto.side_dishes),
		price_student: parse_price(dto.price_student.as_deref())?,
		price_staff: parse_price(dto.price_staff.as_deref())?,
		allergens,
		dish_type_id: dto.dish_type_id,
		pictogram_id: dto.pictogram_id,
		serving_place_ids: dto.serving_place_ids.into_iter().collect(),
	})
}

fn convert_info(subsystem_id: SubsystemId, dto: SubsystemInfoDto) -> Result<SubsystemInfo, ConversionError> {
	let opening_hours = dto
		.opening_hours
		.into_iter()
		.map(convert_opening_hours)
		.collect::<Result<Vec<_>, _>>()?;

	Ok(SubsystemInfo {
		subsystem_id,
		name: require_name("info", dto.name)?,
		address: non_blank(dto.address),
		phone: non_blank(dto.phone),
		email: non_blank(dto.email),
		opening_hours,
	})
}

fn convert_opening_hours(dto: OpeningHoursDto) -> Result<OpeningHours, ConversionError> {
	let weekday: Weekday = dto
		.weekday
		.trim()
		.parse()
		.map_err(|_| ConversionError::new("info", format!("unknown weekday {:?}", dto.weekday)))?;
	let opens = parse_time(&dto.opens)?;
	let closes = parse_time(&dto.closes)?;
	if closes <= opens {
		return Err(ConversionError::new(
			"info",
			format!("{} closes at {} before opening at {}", weekday, closes, opens),
		));
	}

	Ok(OpeningHours {
		weekday,
		opens,
		closes,
	})
}

fn parse_time(value: &str) -> Result<NaiveTime, ConversionError> {
	NaiveTime::parse_from_str(value.trim(), "%H:%M")
		.map_err(|e| ConversionError::new("info", format!("invalid time {:?}: {}", value, e)))
}

/// Parse "2,50" or "2.50" into cents. Blank means not sold.
fn parse_price(value: Option<&str>) -> Result<Option<u32>, ConversionError> {
	let value = match value.map(str::trim) {
		None | Some("") => return Ok(None),
		Some(value) => value,
	};
	let invalid = || ConversionError::new("dishes", format!("invalid price {:?}", value));

	let normalized = value.replace(',', ".");
	let (units, fraction) = normalized.split_once('.').unwrap_or((normalized.as_str(), ""));
	if units.is_empty() || fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}

	let units: u32 = units.parse().map_err(|_| invalid())?;
	let cents = match fraction.len() {
		0 => 0,
		1 => fraction.parse::<u32>().map_err(|_| invalid())? * 10,
		_ => fraction.parse::<u32>().map_err(|_| invalid())?,
	};

	units
		.checked_mul(100)
		.and_then(|total| total.checked_add(cents))
		.map(Some)
		.ok_or_else(invalid)
}

fn require_name(resource: &'static str, name: String) -> Result<String, ConversionError> {
	let trimmed = name.trim();
	if trimmed.is_empty() {
		return Err(ConversionError::new(resource, "empty name"));
	}
	Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}
