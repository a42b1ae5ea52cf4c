//! Table instance - the single state container behind one rendered table
//!
//! Owns the row store, filter state, sort state and viewport, plus the decode
//! worker and preference sync whose lifetimes are tied to it. Every mutation
//! goes through a method here, and every method that changes the row set,
//! the filters or the sort order rebuilds the visible view.

use std::ops::RangeInclusive;
use std::sync::Arc;

use ahash::AHashMap;
use rt_core::columns::filterable;
use rt_core::{
    derive_view, option_domain, Choice, ColumnId, FilterKind, FilterState, PreferenceStore,
    PreferenceSync, RequestId, Row, SortState, TableConfig, TableStatus, Value, ViewportWindow,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::RowStore;
use crate::worker::{DecodeRequest, DecodeResponse, DecodeWorker, Notifier};
use crate::{DataError, DecodeError};

/// Outcome of a response drained by [`TableInstance::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// The latest request decoded and replaced the row store
    Applied { request: RequestId, rows: usize, dropped: usize },
    /// The latest request failed; the previous rows are still shown
    Failed { request: RequestId, error: DecodeError },
    /// A response to an older request arrived and was discarded
    Superseded { request: RequestId },
}

pub struct TableInstance {
    config: TableConfig,
    status: TableStatus,

    store: RowStore,
    filters: FilterState,
    sort: SortState,
    viewport: ViewportWindow,

    /// Store indices in display order
    view: Vec<usize>,
    /// Distinct values offered to each equality column
    domains: AHashMap<ColumnId, Vec<Value>>,
    dropped: usize,

    next_request: u64,
    latest_request: Option<RequestId>,
    responses: mpsc::UnboundedReceiver<DecodeResponse>,
    worker: DecodeWorker,
    prefs: PreferenceSync,
}

impl TableInstance {
    /// Create a table, spawning its decode worker on `handle` and restoring
    /// range filters from `preferences`
    pub fn new(
        handle: &Handle,
        config: TableConfig,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self::with_notifier(handle, config, preferences, None)
    }

    pub fn with_notifier(
        handle: &Handle,
        config: TableConfig,
        preferences: Arc<dyn PreferenceStore>,
        notifier: Option<Notifier>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(handle, tx, notifier);

        let mut prefs = PreferenceSync::new(handle, preferences, config.preference_prefix.clone());
        let mut filters = FilterState::new();
        for (column, bounds) in prefs.restore() {
            if let Err(e) = filters.set_range(column, bounds.min, bounds.max) {
                tracing::warn!("Ignoring stored range for {}: {}", column, e);
            }
        }

        Self {
            viewport: config.viewport(),
            config,
            status: TableStatus::Idle,
            store: RowStore::new(),
            filters,
            sort: SortState::default(),
            view: Vec::new(),
            domains: AHashMap::new(),
            dropped: 0,
            next_request: 0,
            latest_request: None,
            responses: rx,
            worker,
            prefs,
        }
    }

    // ---- decoding ---------------------------------------------------------

    /// Hand a payload to the decode worker. Returns immediately; the current
    /// rows stay visible until [`TableInstance::poll`] applies the result.
    pub fn submit(&mut self, payload: impl Into<String>) -> Result<RequestId, DataError> {
        self.next_request += 1;
        let id = RequestId(self.next_request);

        self.worker.submit(DecodeRequest { id, payload: payload.into() })?;
        self.latest_request = Some(id);
        self.status = TableStatus::Decoding { request: id };
        Ok(id)
    }

    /// Apply every response that has arrived since the last call
    pub fn poll(&mut self) -> Vec<TableEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.responses.try_recv() {
            events.push(self.apply(response));
        }
        events
    }

    fn apply(&mut self, response: DecodeResponse) -> TableEvent {
        let request = response.id();
        if self.latest_request != Some(request) {
            tracing::debug!("Discarding response to superseded request {}", request);
            return TableEvent::Superseded { request };
        }

        match response {
            DecodeResponse::Decoded { decoded, .. } => {
                let rows = decoded.rows.len();
                let dropped = decoded.issues.len();

                self.store.replace(decoded.rows, request);
                self.dropped = dropped;
                self.rebuild_domains();
                self.refresh_view();
                self.status = TableStatus::Ready;

                tracing::info!(
                    "Applied request {}: {} rows, {} visible, {} dropped",
                    request,
                    rows,
                    self.view.len(),
                    dropped
                );
                TableEvent::Applied { request, rows, dropped }
            }
            DecodeResponse::Failed { error, .. } => {
                tracing::error!("Request {} failed, keeping previous rows: {}", request, error);
                self.status = TableStatus::Error { request, reason: error.to_string() };
                TableEvent::Failed { request, error }
            }
        }
    }

    fn rebuild_domains(&mut self) {
        let rows = self.store.rows();
        self.domains = filterable(FilterKind::Equality)
            .map(|column| (column.id, option_domain(rows, column.id)))
            .collect();
    }

    fn refresh_view(&mut self) {
        self.view = derive_view(
            self.store.rows(),
            &self.filters,
            &self.sort,
            self.config.parallel_threshold,
        );
        self.viewport.set_row_count(self.view.len());
    }

    // ---- filters ----------------------------------------------------------

    /// `Choice::All` clears the column's predicate
    pub fn set_equality(&mut self, column: ColumnId, choice: Choice) -> Result<(), DataError> {
        if self.filters.set_equality(column, choice)? {
            self.filters_changed();
        }
        Ok(())
    }

    /// Both bounds absent clears the column's predicate
    pub fn set_range(
        &mut self,
        column: ColumnId,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), DataError> {
        if self.filters.set_range(column, min, max)? {
            self.filters_changed();
        }
        Ok(())
    }

    /// Clear every filter and scroll back to the top
    pub fn reset_all(&mut self) {
        if self.filters.clear() {
            self.filters_changed();
        }
        self.viewport.reset();
    }

    fn filters_changed(&mut self) {
        self.refresh_view();
        self.prefs.persist(&self.filters);
    }

    // ---- sorting ----------------------------------------------------------

    /// Header interaction; `multi` is the modifier gesture
    pub fn toggle_sort(&mut self, column: ColumnId, multi: bool) {
        self.sort.toggle(column, multi);
        self.refresh_view();
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
        self.refresh_view();
    }

    // ---- viewport ---------------------------------------------------------

    pub fn scroll_to(&mut self, offset: f64) -> bool {
        self.viewport.set_scroll_offset(offset)
    }

    pub fn set_container_extent(&mut self, extent: f64) {
        self.viewport.set_container_extent(extent);
    }

    pub fn set_row_extent(&mut self, extent: f64) {
        self.viewport.set_row_extent(extent);
    }

    /// View positions that must be rendered right now
    pub fn visible_range(&self) -> Option<RangeInclusive<usize>> {
        self.viewport.visible_range()
    }

    /// Rows inside the visible range, with their view position
    pub fn visible_rows(&self) -> impl Iterator<Item = (usize, &Row)> + '_ {
        let range = self.visible_range().unwrap_or(1..=0);
        range.filter_map(move |position| self.row_at(position).map(|row| (position, row)))
    }

    pub fn total_extent(&self) -> f64 {
        self.viewport.total_extent()
    }

    // ---- accessors --------------------------------------------------------

    /// Row at a position of the filtered, sorted view
    pub fn row_at(&self, position: usize) -> Option<&Row> {
        self.view.get(position).and_then(|&idx| self.store.get(idx))
    }

    /// Filtered, sorted rows
    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.view.iter().filter_map(move |&idx| self.store.get(idx))
    }

    /// Store indices in display order
    pub fn view(&self) -> &[usize] {
        &self.view
    }

    pub fn visible_count(&self) -> usize {
        self.view.len()
    }

    pub fn total_count(&self) -> usize {
        self.store.len()
    }

    /// Records dropped by the decode that produced the current rows
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    /// Options for an equality filter, empty for other columns
    pub fn option_domain(&self, column: ColumnId) -> &[Value] {
        self.domains.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn status(&self) -> &TableStatus {
        &self.status
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn viewport(&self) -> &ViewportWindow {
        &self.viewport
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.latest_request
    }

    /// Tear the instance down. The decode worker is aborted and unapplied
    /// responses are dropped with the instance. The returned handle completes
    /// once queued preference writes are flushed.
    pub fn shutdown(mut self) -> Option<JoinHandle<()>> {
        tracing::debug!("Shutting down table instance");
        self.worker.shutdown();
        self.prefs.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_payload;
    use rt_core::{MemoryPreferenceStore, SortKey};
    use serde_json::json;

    fn record(engine: &str, diameter: f64, wet_mass: f64, twr: f64) -> serde_json::Value {
        json!({
            "engine": engine,
            "diameter": diameter,
            "wetMass": wet_mass,
            "dryMass": wet_mass / 4.0,
            "deltaVVac": 3000.0,
            "deltaVAsl": 2600.0,
            "twr": twr,
            "numEngines": 1
        })
    }

    fn decoded(id: u64, records: serde_json::Value) -> DecodeResponse {
        DecodeResponse::Decoded {
            id: RequestId(id),
            decoded: decode_payload(&records.to_string()).unwrap(),
        }
    }

    fn table() -> TableInstance {
        TableInstance::new(
            &Handle::current(),
            TableConfig::default(),
            Arc::new(MemoryPreferenceStore::new()),
        )
    }

    fn engines(table: &TableInstance) -> Vec<String> {
        table.rows().map(|row| row.engine.clone()).collect()
    }

    #[tokio::test]
    async fn test_late_response_to_older_request_is_discarded() {
        let mut table = table();
        let a = table.submit("a").unwrap();
        let b = table.submit("b").unwrap();

        let applied = table.apply(decoded(b.0, json!([record("B", 1.0, 1.0, 1.0)])));
        assert!(matches!(applied, TableEvent::Applied { rows: 1, .. }));
        let late = table.apply(decoded(a.0, json!([record("A", 1.0, 1.0, 1.0)])));

        assert_eq!(late, TableEvent::Superseded { request: a });
        assert_eq!(engines(&table), vec!["B"]);
        assert_eq!(table.store().source(), Some(b));
        assert_eq!(*table.status(), TableStatus::Ready);
    }

    #[tokio::test]
    async fn test_older_response_before_newer_is_discarded() {
        let mut table = table();
        let a = table.submit("a").unwrap();
        let _b = table.submit("b").unwrap();

        let early = table.apply(decoded(a.0, json!([record("A", 1.0, 1.0, 1.0)])));
        assert_eq!(early, TableEvent::Superseded { request: a });
        assert!(table.store().is_empty());
        assert!(table.status().is_decoding());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_rows() {
        let mut table = table();
        let first = table.submit("ok").unwrap();
        table.apply(decoded(first.0, json!([record("A", 1.0, 1.0, 1.0), record("B", 1.0, 2.0, 1.0)])));

        let second = table.submit("{not valid json").unwrap();
        let event = table.apply(DecodeResponse::Failed {
            id: second,
            error: DecodeError::MalformedPayload("bad".into()),
        });

        assert!(matches!(event, TableEvent::Failed { .. }));
        assert!(matches!(table.status(), TableStatus::Error { request, .. } if *request == second));
        assert_eq!(engines(&table), vec!["A", "B"]);

        // Error → Decoding on the next payload
        table.submit("again").unwrap();
        assert!(table.status().is_decoding());
    }

    #[tokio::test]
    async fn test_filters_survive_row_replacement() {
        let mut table = table();
        table.set_equality(ColumnId::Diameter, Choice::Only(Value::Number(0.3))).unwrap();

        let first = table.submit("1").unwrap();
        table.apply(decoded(
            first.0,
            json!([record("A", 0.3, 1.0, 1.0), record("B", 0.5, 1.0, 1.0), record("C", 0.3, 1.0, 1.0)]),
        ));
        assert_eq!(engines(&table), vec!["A", "C"]);
        assert_eq!(table.view(), &[0, 2]);

        let second = table.submit("2").unwrap();
        table.apply(decoded(second.0, json!([record("D", 0.5, 1.0, 1.0), record("E", 0.3, 1.0, 1.0)])));
        assert_eq!(engines(&table), vec!["E"]);
        assert_eq!(table.option_domain(ColumnId::Diameter), &[Value::Number(0.3), Value::Number(0.5)]);
    }

    #[tokio::test]
    async fn test_sort_then_window() {
        let mut table = table();
        let id = table.submit("rows").unwrap();
        table.apply(decoded(
            id.0,
            json!([
                record("A", 1.0, 5.0, 1.0),
                record("B", 1.0, 5.0, 3.0),
                record("C", 1.0, 1.0, 2.0)
            ]),
        ));
        table.set_sort(SortState::new(vec![SortKey::asc(ColumnId::WetMass), SortKey::desc(ColumnId::Twr)]));
        assert_eq!(engines(&table), vec!["C", "B", "A"]);

        let visible: Vec<usize> = table.visible_rows().map(|(position, _)| position).collect();
        assert_eq!(visible, vec![0, 1, 2]);
        assert_eq!(table.total_extent(), 3.0 * table.config().row_extent);
    }

    #[tokio::test]
    async fn test_reset_all_clears_filters_and_scroll() {
        let mut table = table();
        let rows: Vec<serde_json::Value> = (0..200).map(|i| record("A", 1.0, i as f64, 1.0)).collect();
        let id = table.submit("rows").unwrap();
        table.apply(decoded(id.0, serde_json::Value::Array(rows)));

        table.set_range(ColumnId::WetMass, Some(10.0), None).unwrap();
        table.scroll_to(1000.0);
        assert_eq!(table.visible_count(), 190);

        table.reset_all();
        assert!(table.filters().is_empty());
        assert_eq!(table.visible_count(), 200);
        assert_eq!(table.viewport().scroll_offset(), 0.0);
    }

    #[tokio::test]
    async fn test_rejected_filter_leaves_state() {
        let mut table = table();
        assert!(matches!(
            table.set_range(ColumnId::Engine, Some(1.0), None),
            Err(DataError::Filter(_))
        ));
        assert!(table.filters().is_empty());
    }
}
