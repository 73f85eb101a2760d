//! Reactive join of parent rows with their live detail records.
//!
//! [`observe`] takes a stream of parent-row snapshots plus a [`DetailSource`]
//! that can open one live stream per referenced detail record, and yields a
//! grouped, ordered view every time either the row set or any referenced
//! detail changes.

/// Stream combinator holding the per-row subscription index
mod stream;

pub use stream::JoinStream;

use futures::stream::BoxStream;
use std::collections::BTreeSet;
use std::hash::Hash;

/// A parent record that references a kind, an optional pictogram and a set
/// of serving places.
pub trait JoinRow: Clone + Send + 'static {
	type RowKey: Clone + Eq + Hash + Send;
	type KindKey: Clone + Eq + Hash + Send;
	type PictogramKey: Clone + Eq + Send;
	type PlaceKey: Clone + Ord + Send;

	fn row_key(&self) -> Self::RowKey;
	fn kind_key(&self) -> Self::KindKey;
	fn pictogram_key(&self) -> Option<Self::PictogramKey>;
	fn serving_place_keys(&self) -> BTreeSet<Self::PlaceKey>;
}

/// Records that groups are ordered by.
pub trait DisplayOrder {
	fn display_order(&self) -> i32;
}

/// Opens live streams of the detail records a [`JoinRow`] references.
///
/// Each stream emits the current value on subscription and again on every
/// change. Dropping the stream ends the subscription.
pub trait DetailSource<R: JoinRow> {
	type Kind: DisplayOrder + Clone + Send + 'static;
	type Pictogram: Clone + Send + 'static;
	type Place: Clone + Send + 'static;

	fn kind_of(&self, key: &R::KindKey) -> BoxStream<'static, Self::Kind>;

	/// `None` is emitted while the referenced pictogram does not exist.
	fn pictogram_of(&self, key: &R::PictogramKey) -> BoxStream<'static, Option<Self::Pictogram>>;

	fn serving_places_of(&self, keys: &BTreeSet<R::PlaceKey>) -> BoxStream<'static, Vec<Self::Place>>;
}

/// A parent row with all of its references resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow<R, K, P, S> {
	pub row: R,
	pub kind: K,
	pub pictogram: Option<P>,
	pub serving_places: Vec<S>,
}

/// One kind with the joined rows that belong to it, in snapshot order.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord<R, K, P, S> {
	pub kind: K,
	pub rows: Vec<JoinedRow<R, K, P, S>>,
}

/// Output item of a [`JoinStream`].
pub type JoinedView<R, D> = Vec<
	ViewRecord<
		R,
		<D as DetailSource<R>>::Kind,
		<D as DetailSource<R>>::Pictogram,
		<D as DetailSource<R>>::Place,
	>,
>;

/// Join every snapshot of `rows` with the details `source` provides.
pub fn observe<R, D>(rows: BoxStream<'static, Vec<R>>, source: D) -> JoinStream<R, D>
where
	R: JoinRow,
	D: DetailSource<R>,
{
	JoinStream::new(rows, source)
}
