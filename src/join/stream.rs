use crate::join::{DetailSource, DisplayOrder, JoinRow, JoinedRow, JoinedView, ViewRecord};

use futures::stream::{self, BoxStream, Fuse, FusedStream};
use futures::{Stream, StreamExt, future};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// Foreign keys of a row. A row keeps its subscriptions while these are unchanged.
struct Links<R: JoinRow> {
	kind: R::KindKey,
	pictogram: Option<R::PictogramKey>,
	places: BTreeSet<R::PlaceKey>,
}

impl<R: JoinRow> Links<R> {
	fn of(row: &R) -> Self {
		Self {
			kind: row.kind_key(),
			pictogram: row.pictogram_key(),
			places: row.serving_place_keys(),
		}
	}
}

impl<R: JoinRow> PartialEq for Links<R> {
	fn eq(&self, other: &Self) -> bool {
		self.kind == other.kind && self.pictogram == other.pictogram && self.places == other.places
	}
}

/// A detail stream together with the last value it produced.
struct Latest<T> {
	stream: Fuse<BoxStream<'static, T>>,
	value: Option<T>,
}

impl<T> Latest<T> {
	fn new(stream: BoxStream<'static, T>) -> Self {
		Self {
			stream: stream.fuse(),
			value: None,
		}
	}

	/// Take every ready item, keeping the last. Returns whether anything arrived.
	fn poll_drain(&mut self, cx: &mut Context<'_>) -> bool {
		let mut updated = false;
		while let Poll::Ready(Some(value)) = self.stream.poll_next_unpin(cx) {
			self.value = Some(value);
			updated = true;
		}
		updated
	}

	fn is_terminated(&self) -> bool {
		self.stream.is_terminated()
	}
}

struct RowSubscription<R: JoinRow, D: DetailSource<R>> {
	row: R,
	links: Links<R>,
	kind: Latest<D::Kind>,
	pictogram: Latest<Option<D::Pictogram>>,
	places: Latest<Vec<D::Place>>,
}

impl<R: JoinRow, D: DetailSource<R>> RowSubscription<R, D> {
	fn subscribe(row: R, links: Links<R>, source: &D) -> Self {
		let pictogram = match &links.pictogram {
			Some(key) => source.pictogram_of(key),
			None => stream::once(future::ready(None)).boxed(),
		};
		Self {
			kind: Latest::new(source.kind_of(&links.kind)),
			pictogram: Latest::new(pictogram),
			places: Latest::new(source.serving_places_of(&links.places)),
			row,
			links,
		}
	}

	fn poll_drain(&mut self, cx: &mut Context<'_>) -> bool {
		self.kind.poll_drain(cx) | self.pictogram.poll_drain(cx) | self.places.poll_drain(cx)
	}

	/// The joined row, once every detail stream has produced a value.
	fn joined(&self) -> Option<JoinedRow<R, D::Kind, D::Pictogram, D::Place>> {
		Some(JoinedRow {
			row: self.row.clone(),
			kind: self.kind.value.clone()?,
			pictogram: self.pictogram.value.clone()?,
			serving_places: self.places.value.clone()?,
		})
	}

	fn is_terminated(&self) -> bool {
		self.kind.is_terminated() && self.pictogram.is_terminated() && self.places.is_terminated()
	}
}

/// Stream returned by [`observe`](crate::join::observe).
///
/// Holds one subscription per row of the latest snapshot, indexed by row key.
/// A new snapshot is diffed against the index: rows whose links are unchanged
/// keep their subscriptions, everything else is dropped and resubscribed. A
/// view is emitted once every row has all of its details, and again after
/// each change.
pub struct JoinStream<R: JoinRow, D: DetailSource<R>> {
	rows: Fuse<BoxStream<'static, Vec<R>>>,
	source: D,
	/// `None` until the first snapshot arrives.
	subscriptions: Option<Vec<RowSubscription<R, D>>>,
	dirty: bool,
}

// Nothing is structurally pinned: detail streams are boxed, the rest is plain data.
impl<R: JoinRow, D: DetailSource<R> + Unpin> Unpin for JoinStream<R, D> {}

impl<R: JoinRow, D: DetailSource<R>> JoinStream<R, D> {
	pub(crate) fn new(rows: BoxStream<'static, Vec<R>>, source: D) -> Self {
		Self {
			rows: rows.fuse(),
			source,
			subscriptions: None,
			dirty: false,
		}
	}

	/// Number of rows in the current snapshot.
	pub fn len(&self) -> usize {
		self.subscriptions.as_ref().map_or(0, Vec::len)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn rebuild(&mut self, rows: Vec<R>) {
		let mut previous: HashMap<R::RowKey, RowSubscription<R, D>> = self
			.subscriptions
			.take()
			.unwrap_or_default()
			.into_iter()
			.map(|subscription| (subscription.row.row_key(), subscription))
			.collect();

		let mut kept = 0;
		let mut next = Vec::with_capacity(rows.len());
		for row in rows {
			let links = Links::of(&row);
			match previous.remove(&row.row_key()) {
				Some(mut subscription) if subscription.links == links => {
					subscription.row = row;
					kept += 1;
					next.push(subscription);
				}
				_ => next.push(RowSubscription::subscribe(row, links, &self.source)),
			}
		}

		trace!(
			"Join rebuilt: {} rows kept, {} subscribed, {} dropped",
			kept,
			next.len() - kept,
			previous.len()
		);
		self.subscriptions = Some(next);
		self.dirty = true;
	}
}

impl<R, D> Stream for JoinStream<R, D>
where
	R: JoinRow,
	D: DetailSource<R> + Unpin,
{
	type Item = JoinedView<R, D>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();

		let mut latest = None;
		while let Poll::Ready(Some(rows)) = this.rows.poll_next_unpin(cx) {
			latest = Some(rows);
		}
		if let Some(rows) = latest {
			this.rebuild(rows);
		}

		let Some(subscriptions) = this.subscriptions.as_mut() else {
			return if this.rows.is_terminated() {
				Poll::Ready(None)
			} else {
				Poll::Pending
			};
		};

		for subscription in subscriptions.iter_mut() {
			if subscription.poll_drain(cx) {
				this.dirty = true;
			}
		}

		if this.dirty {
			let joined: Option<Vec<_>> = subscriptions.iter().map(RowSubscription::joined).collect();
			if let Some(joined) = joined {
				this.dirty = false;
				return Poll::Ready(Some(arrange(joined)));
			}
		}

		if this.rows.is_terminated() && subscriptions.iter().all(RowSubscription::is_terminated) {
			return Poll::Ready(None);
		}
		Poll::Pending
	}
}

/// Group joined rows by kind, keeping snapshot order inside each group, and
/// order the groups by the kind's display order.
fn arrange<R, K, P, S>(joined: Vec<JoinedRow<R, K, P, S>>) -> Vec<ViewRecord<R, K, P, S>>
where
	R: JoinRow,
	K: DisplayOrder + Clone,
{
	let mut index: HashMap<R::KindKey, usize> = HashMap::new();
	let mut groups: Vec<ViewRecord<R, K, P, S>> = Vec::new();

	for item in joined {
		let key = item.row.kind_key();
		match index.get(&key) {
			Some(&position) => groups[position].rows.push(item),
			None => {
				index.insert(key, groups.len());
				groups.push(ViewRecord {
					kind: item.kind.clone(),
					rows: vec![item],
				});
			}
		}
	}

	groups
		.into_iter()
		.sorted_by_key(|group| group.kind.display_order())
		.collect()
}
